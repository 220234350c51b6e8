use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::authz::audit::{AuditSink, DecisionRecord, TracingAudit};
use crate::authz::builder::AbilityFactory;
use crate::authz::errors::AuthzError;
use crate::authz::handlers::PolicyHandler;
use crate::authz::types::{Action, Principal, Resource, SubjectTag};

pub const UNAUTHENTICATED_MESSAGE: &str = "User not authenticated";
pub const FORBIDDEN_MESSAGE: &str =
    "You do not have sufficient permissions to access this resource";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DenialCode {
    Unauthenticated,
    Forbidden,
}

impl DenialCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialCode::Unauthenticated => "unauthenticated",
            DenialCode::Forbidden => "forbidden",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
    #[serde(rename = "error")]
    pub code: DenialCode,
    pub message: String,
}

impl Denial {
    pub fn unauthenticated() -> Self {
        Self {
            code: DenialCode::Unauthenticated,
            message: UNAUTHENTICATED_MESSAGE.to_string(),
        }
    }

    pub fn forbidden() -> Self {
        Self {
            code: DenialCode::Forbidden,
            message: FORBIDDEN_MESSAGE.to_string(),
        }
    }
}

/// Terminal outcome of one gate evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(Denial),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Decision::Allowed => None,
            Decision::Denied(denial) => Some(denial),
        }
    }
}

/// Progress of a request through the gate, for trace output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Authenticated,
    AbilityBuilt,
    PolicyEvaluated,
}

/// A guarded operation (typically one endpoint) and the handlers it declares.
#[derive(Clone)]
pub struct Operation {
    name: String,
    handlers: Vec<Arc<dyn PolicyHandler>>,
}

impl Operation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: Vec::new(),
        }
    }

    pub fn guarded_by(mut self, handler: impl PolicyHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn guarded_by_shared(mut self, handler: Arc<dyn PolicyHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handlers(&self) -> &[Arc<dyn PolicyHandler>] {
        &self.handlers
    }

    pub fn targets(&self) -> Vec<(Action, SubjectTag)> {
        self.handlers.iter().filter_map(|h| h.target()).collect()
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers: Vec<&str> = self.handlers.iter().map(|h| h.name()).collect();
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("handlers", &handlers)
            .finish()
    }
}

/// Operations by name.
#[derive(Debug, Clone, Default)]
pub struct Operations {
    by_name: HashMap<String, Operation>,
}

impl Operations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, operation: Operation) -> &mut Self {
        self.by_name.insert(operation.name.clone(), operation);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.by_name.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Request-level enforcement point.
pub struct Gate<F: AbilityFactory> {
    factory: Arc<F>,
    audit: Arc<dyn AuditSink>,
}

impl<F: AbilityFactory> Clone for Gate<F> {
    fn clone(&self) -> Self {
        Self {
            factory: Arc::clone(&self.factory),
            audit: Arc::clone(&self.audit),
        }
    }
}

impl<F: AbilityFactory> Gate<F> {
    pub fn new(factory: Arc<F>) -> Self {
        Self::with_audit(factory, Arc::new(TracingAudit::default()))
    }

    pub fn with_audit(factory: Arc<F>, audit: Arc<dyn AuditSink>) -> Self {
        Self { factory, audit }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Decide whether `principal` may run `operation`, optionally against a
    /// resource the caller has already loaded.
    ///
    /// Operations without handlers are not guarded and always pass. Handler
    /// faults count as a failed check; an error from building the ability is
    /// returned as `Err` because it means the rule templates are broken.
    pub fn authorize(
        &self,
        principal: Option<&Principal>,
        operation: &Operation,
        resource: Option<&Resource>,
    ) -> Result<Decision, AuthzError> {
        if operation.handlers.is_empty() {
            tracing::debug!(operation = %operation.name, "no policies defined for operation");
            return Ok(Decision::Allowed);
        }

        let targets = operation.targets();
        let record = |principal: Option<&Principal>, decision: &Decision| {
            self.audit.decision(&DecisionRecord {
                principal,
                operation: &operation.name,
                targets: &targets,
                resource_kind: resource.map(|r| r.kind),
                resource_id: resource.and_then(Resource::id),
                decision,
            });
        };

        let Some(principal) = principal else {
            let decision = Decision::Denied(Denial::unauthenticated());
            record(None, &decision);
            return Ok(decision);
        };
        trace_stage(Stage::Authenticated, principal, operation);

        let ability = self.factory.define_ability(principal)?;
        self.audit.ability_built(&ability);
        trace_stage(Stage::AbilityBuilt, principal, operation);

        let mut allowed = true;
        for handler in &operation.handlers {
            let passed = match handler.handle(&ability, resource) {
                Ok(passed) => passed,
                Err(e) => {
                    self.audit.handler_fault(principal, handler.name(), &e);
                    false
                }
            };
            tracing::debug!(handler = handler.name(), passed, "policy check");
            if !passed {
                if let Some((action, subject)) = handler.target() {
                    let deciding = match resource {
                        Some(r) if r.kind == subject => ability.relevant_rule(action, r),
                        _ => ability.relevant_rule(action, subject),
                    };
                    if let Ok(Some(rule)) = deciding {
                        tracing::debug!(
                            handler = handler.name(),
                            effect = ?rule.effect,
                            reason = rule.reason.as_deref().unwrap_or("-"),
                            "deciding rule"
                        );
                    }
                }
            }
            allowed &= passed;
        }
        trace_stage(Stage::PolicyEvaluated, principal, operation);

        let decision = if allowed {
            Decision::Allowed
        } else {
            Decision::Denied(Denial::forbidden())
        };
        record(Some(principal), &decision);
        Ok(decision)
    }
}

fn trace_stage(stage: Stage, principal: &Principal, operation: &Operation) {
    tracing::trace!(
        stage = ?stage,
        principal = %principal.id,
        operation = %operation.name,
        "gate stage"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::ability::{Ability, Rule};
    use crate::authz::audit::NoopAudit;
    use crate::authz::handlers::{OwnershipPolicy, PolicyFn, ResourcePolicy};
    use crate::authz::types::Role;
    use crate::authz::RoleTemplates;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAudit {
        built: Mutex<usize>,
        decisions: Mutex<Vec<(String, bool)>>,
        faults: Mutex<Vec<String>>,
    }

    impl AuditSink for RecordingAudit {
        fn ability_built(&self, _ability: &Ability) {
            *self.built.lock().unwrap() += 1;
        }

        fn decision(&self, record: &DecisionRecord<'_>) {
            self.decisions
                .lock()
                .unwrap()
                .push((record.operation.to_string(), record.decision.is_allowed()));
        }

        fn handler_fault(&self, _principal: &Principal, handler: &str, _error: &AuthzError) {
            self.faults.lock().unwrap().push(handler.to_string());
        }
    }

    struct BrokenFactory;

    impl AbilityFactory for BrokenFactory {
        fn define_ability(&self, _principal: &Principal) -> Result<Ability, AuthzError> {
            Err(AuthzError::InvalidRule("template exploded".into()))
        }
    }

    fn templates() -> Arc<RoleTemplates> {
        let mut t = RoleTemplates::new();
        t.register_rules(
            Role::Student,
            vec![
                Rule::allow(&[Action::Create], SubjectTag::Enrollment),
                Rule::allow(&[Action::Read, Action::Delete], SubjectTag::Enrollment)
                    .when("resource.student_id == principal.id")
                    .unwrap(),
            ],
        );
        Arc::new(t)
    }

    fn gate_with(audit: Arc<RecordingAudit>) -> Gate<RoleTemplates> {
        Gate::with_audit(templates(), audit)
    }

    fn delete_enrollment() -> Operation {
        Operation::new("enrollments.delete")
            .guarded_by(OwnershipPolicy::new(Action::Delete, SubjectTag::Enrollment))
    }

    fn enrollment(student_id: &str) -> Resource {
        Resource::new(
            SubjectTag::Enrollment,
            json!({ "id": "E1", "student_id": student_id }),
        )
    }

    #[test]
    fn test_unguarded_operation_always_allows() {
        let audit = Arc::new(RecordingAudit::default());
        let gate = gate_with(audit.clone());
        let open = Operation::new("health");
        assert_eq!(gate.authorize(None, &open, None).unwrap(), Decision::Allowed);
        let guest = Principal::new("G", Role::Guest);
        assert_eq!(
            gate.authorize(Some(&guest), &open, None).unwrap(),
            Decision::Allowed
        );
        assert_eq!(*audit.built.lock().unwrap(), 0);
    }

    #[test]
    fn test_missing_principal_is_unauthenticated() {
        let gate = gate_with(Arc::new(RecordingAudit::default()));
        let decision = gate.authorize(None, &delete_enrollment(), None).unwrap();
        let denial = decision.denial().unwrap();
        assert_eq!(denial.code, DenialCode::Unauthenticated);
        assert_eq!(denial.message, UNAUTHENTICATED_MESSAGE);
    }

    #[test]
    fn test_owner_allowed_other_forbidden() {
        let audit = Arc::new(RecordingAudit::default());
        let gate = gate_with(audit.clone());
        let s1 = Principal::new("S1", Role::Student);

        let own = gate
            .authorize(Some(&s1), &delete_enrollment(), Some(&enrollment("S1")))
            .unwrap();
        assert!(own.is_allowed());

        let other = gate
            .authorize(Some(&s1), &delete_enrollment(), Some(&enrollment("S2")))
            .unwrap();
        assert_eq!(other, Decision::Denied(Denial::forbidden()));

        assert_eq!(*audit.built.lock().unwrap(), 2);
        assert_eq!(
            *audit.decisions.lock().unwrap(),
            vec![
                ("enrollments.delete".to_string(), true),
                ("enrollments.delete".to_string(), false)
            ]
        );
    }

    #[test]
    fn test_all_handlers_must_pass() {
        let gate = gate_with(Arc::new(RecordingAudit::default()));
        let s1 = Principal::new("S1", Role::Student);
        let op = Operation::new("enrollments.create-and-read")
            .guarded_by(ResourcePolicy::new(Action::Create, SubjectTag::Enrollment))
            .guarded_by(ResourcePolicy::new(Action::Read, SubjectTag::Lecturer));
        let decision = gate.authorize(Some(&s1), &op, None).unwrap();
        assert_eq!(decision.denial().unwrap().code, DenialCode::Forbidden);

        let op = Operation::new("enrollments.create")
            .guarded_by(ResourcePolicy::new(Action::Create, SubjectTag::Enrollment));
        assert!(gate.authorize(Some(&s1), &op, None).unwrap().is_allowed());
    }

    #[test]
    fn test_handler_fault_counts_as_denied() {
        let audit = Arc::new(RecordingAudit::default());
        let gate = gate_with(audit.clone());
        let s1 = Principal::new("S1", Role::Student);
        let op = Operation::new("enrollments.create")
            .guarded_by(ResourcePolicy::new(Action::Create, SubjectTag::Enrollment))
            .guarded_by(PolicyFn::new("explodes", |_, _| {
                Err(AuthzError::MalformedResource("bad payload".into()))
            }));
        let decision = gate.authorize(Some(&s1), &op, None).unwrap();
        assert_eq!(decision, Decision::Denied(Denial::forbidden()));
        assert_eq!(*audit.faults.lock().unwrap(), vec!["explodes".to_string()]);
    }

    #[test]
    fn test_malformed_resource_is_a_fault_not_a_grant() {
        let audit = Arc::new(RecordingAudit::default());
        let gate = gate_with(audit.clone());
        let s1 = Principal::new("S1", Role::Student);
        let bad = Resource::new(SubjectTag::Enrollment, json!("E1"));
        let decision = gate
            .authorize(Some(&s1), &delete_enrollment(), Some(&bad))
            .unwrap();
        assert!(!decision.is_allowed());
        assert_eq!(audit.faults.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_every_handler_is_evaluated() {
        let audit = Arc::new(RecordingAudit::default());
        let gate = gate_with(audit.clone());
        let s1 = Principal::new("S1", Role::Student);
        let op = Operation::new("two-faults")
            .guarded_by(PolicyFn::new("first", |_, _| {
                Err(AuthzError::InvalidCondition("boom".into()))
            }))
            .guarded_by(PolicyFn::new("second", |_, _| {
                Err(AuthzError::InvalidCondition("boom".into()))
            }));
        gate.authorize(Some(&s1), &op, None).unwrap();
        assert_eq!(
            *audit.faults.lock().unwrap(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[test]
    fn test_unknown_role_is_forbidden() {
        let gate = gate_with(Arc::new(RecordingAudit::default()));
        let stranger = Principal::new("X1", Role::from("janitor"));
        let op = Operation::new("enrollments.create")
            .guarded_by(ResourcePolicy::new(Action::Create, SubjectTag::Enrollment));
        let decision = gate.authorize(Some(&stranger), &op, None).unwrap();
        assert_eq!(decision.denial().unwrap().code, DenialCode::Forbidden);
    }

    #[test]
    fn test_builder_fault_propagates() {
        let gate = Gate::with_audit(Arc::new(BrokenFactory), Arc::new(NoopAudit));
        let s1 = Principal::new("S1", Role::Student);
        let err = gate
            .authorize(Some(&s1), &delete_enrollment(), None)
            .unwrap_err();
        assert!(matches!(err, AuthzError::InvalidRule(_)));
    }

    #[test]
    fn test_operations_registry() {
        let mut ops = Operations::new();
        ops.register(delete_enrollment());
        ops.register(Operation::new("health"));
        assert_eq!(ops.len(), 2);
        let op = ops.get("enrollments.delete").unwrap();
        assert_eq!(op.handlers().len(), 1);
        assert_eq!(op.targets(), vec![(Action::Delete, SubjectTag::Enrollment)]);
        assert!(ops.get("missing").is_none());
    }

    #[test]
    fn test_denial_serialization() {
        assert_eq!(
            serde_json::to_value(Denial::forbidden()).unwrap(),
            json!({ "error": "forbidden", "message": FORBIDDEN_MESSAGE })
        );
    }
}
