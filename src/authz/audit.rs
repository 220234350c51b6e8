//! Audit port for authorization events.
//!
//! The gate reports through [`AuditSink`] instead of logging directly, so the
//! decision logic can be exercised without a subscriber and deployments can route
//! audit records elsewhere.

use crate::authz::ability::Ability;
use crate::authz::errors::AuthzError;
use crate::authz::gate::Decision;
use crate::authz::types::{Action, Principal, SubjectTag};

/// One gate outcome. Never carries the resource payload.
#[derive(Debug)]
pub struct DecisionRecord<'a> {
    pub principal: Option<&'a Principal>,
    pub operation: &'a str,
    /// (action, subject) pairs the operation's handlers check
    pub targets: &'a [(Action, SubjectTag)],
    pub resource_kind: Option<SubjectTag>,
    pub resource_id: Option<&'a str>,
    pub decision: &'a Decision,
}

pub trait AuditSink: Send + Sync {
    fn ability_built(&self, ability: &Ability);
    fn decision(&self, record: &DecisionRecord<'_>);
    fn handler_fault(&self, principal: &Principal, handler: &str, error: &AuthzError);
}

/// Writes audit events as `tracing` records.
#[derive(Debug, Clone)]
pub struct TracingAudit {
    /// Log every allow/deny outcome (faults are always logged)
    pub decisions: bool,
}

impl Default for TracingAudit {
    fn default() -> Self {
        Self { decisions: true }
    }
}

impl AuditSink for TracingAudit {
    fn ability_built(&self, ability: &Ability) {
        let principal = ability.principal();
        tracing::debug!(
            principal = %principal.id,
            role = %principal.role,
            rules = ability.rules().len(),
            "ability defined"
        );
    }

    fn decision(&self, record: &DecisionRecord<'_>) {
        if !self.decisions {
            return;
        }
        let (id, role) = match record.principal {
            Some(p) => (p.id.as_str(), p.role.as_str()),
            None => ("-", "-"),
        };
        let targets = format_targets(record.targets);
        let resource = record.resource_kind.map(|k| k.as_str()).unwrap_or("-");
        match record.decision {
            Decision::Allowed => tracing::info!(
                principal = id,
                role,
                operation = record.operation,
                targets = %targets,
                resource,
                "access granted"
            ),
            Decision::Denied(denial) => tracing::warn!(
                principal = id,
                role,
                operation = record.operation,
                targets = %targets,
                resource,
                code = denial.code.as_str(),
                "access denied"
            ),
        }
    }

    fn handler_fault(&self, principal: &Principal, handler: &str, error: &AuthzError) {
        tracing::error!(
            principal = %principal.id,
            role = %principal.role,
            handler,
            error = %error,
            "policy handler failed, treating as denied"
        );
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAudit;

impl AuditSink for NoopAudit {
    fn ability_built(&self, _ability: &Ability) {}
    fn decision(&self, _record: &DecisionRecord<'_>) {}
    fn handler_fault(&self, _principal: &Principal, _handler: &str, _error: &AuthzError) {}
}

fn format_targets(targets: &[(Action, SubjectTag)]) -> String {
    targets
        .iter()
        .map(|(action, subject)| format!("{action} {subject}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reasons attached to the deny rules of an ability, for debugging output.
pub fn forbidden_reasons(ability: &Ability) -> Vec<String> {
    ability
        .rules()
        .iter()
        .filter(|rule| rule.is_inverted())
        .map(|rule| {
            rule.reason
                .clone()
                .unwrap_or_else(|| "No reason provided".to_string())
        })
        .collect()
}

pub fn permission_check_message(
    user_id: &str,
    action: Action,
    entity: SubjectTag,
    allowed: bool,
    resource_id: Option<&str>,
) -> String {
    let verdict = if allowed { "granted" } else { "denied" };
    match resource_id {
        Some(id) => format!("User {user_id} {verdict} {action} on {entity} ({id})"),
        None => format!("User {user_id} {verdict} {action} on {entity}"),
    }
}

/// Audit-trail line for a single permission check.
pub fn log_permission_check(
    user_id: &str,
    action: Action,
    entity: SubjectTag,
    allowed: bool,
    resource_id: Option<&str>,
) {
    let message = permission_check_message(user_id, action, entity, allowed, resource_id);
    if allowed {
        tracing::info!("{message}");
    } else {
        tracing::warn!("{message}");
    }
}
