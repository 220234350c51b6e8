use serde::Serialize;
use serde_json::{json, Value};

use crate::authz::condition::Condition;
use crate::authz::engine;
use crate::authz::errors::AuthzError;
use crate::authz::types::{Action, Principal, Resource, Subject, SubjectTag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

/// One allow or deny statement. Listing several actions is shorthand for one rule
/// per action at the same position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    pub effect: Effect,
    pub actions: Vec<Action>,
    pub subject: SubjectTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Rule {
    pub fn allow(actions: &[Action], subject: SubjectTag) -> Self {
        Self::with_effect(Effect::Allow, actions, subject)
    }

    pub fn deny(actions: &[Action], subject: SubjectTag) -> Self {
        Self::with_effect(Effect::Deny, actions, subject)
    }

    fn with_effect(effect: Effect, actions: &[Action], subject: SubjectTag) -> Self {
        Self {
            effect,
            actions: actions.to_vec(),
            subject,
            condition: None,
            reason: None,
        }
    }

    /// Restrict the rule to instances satisfying `expr`.
    pub fn when(mut self, expr: &str) -> Result<Self, AuthzError> {
        self.condition = Some(Condition::parse(expr)?);
        Ok(self)
    }

    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn is_inverted(&self) -> bool {
        self.effect == Effect::Deny
    }

    pub fn covers(&self, action: Action, subject: SubjectTag) -> bool {
        self.subject == subject && self.actions.iter().any(|a| a.covers(action))
    }
}

/// The rules resolved for one principal, for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ability {
    principal: Principal,
    rules: Vec<Rule>,
}

impl Ability {
    pub fn new(principal: Principal, rules: Vec<Rule>) -> Self {
        Self { principal, rules }
    }

    /// An ability that denies everything.
    pub fn empty(principal: Principal) -> Self {
        Self::new(principal, Vec::new())
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Decide `action` on `subject`. Errors mean a condition could not be
    /// evaluated; they must never be read as a grant.
    pub fn check<'a>(
        &self,
        action: Action,
        subject: impl Into<Subject<'a>>,
    ) -> Result<bool, AuthzError> {
        engine::check(self, action, subject.into())
    }

    /// Fail-closed variant of [`Ability::check`].
    pub fn can<'a>(&self, action: Action, subject: impl Into<Subject<'a>>) -> bool {
        let subject = subject.into();
        match self.check(action, subject) {
            Ok(allowed) => allowed,
            Err(e) => {
                tracing::warn!(
                    principal = %self.principal.id,
                    %action,
                    subject = %subject.tag(),
                    error = %e,
                    "permission check failed, denying"
                );
                false
            }
        }
    }

    pub fn cannot<'a>(&self, action: Action, subject: impl Into<Subject<'a>>) -> bool {
        !self.can(action, subject)
    }

    /// The rule that decides `action` on `subject`, if any matches.
    pub fn relevant_rule<'a>(
        &self,
        action: Action,
        subject: impl Into<Subject<'a>>,
    ) -> Result<Option<&Rule>, AuthzError> {
        engine::relevant_rule(self, action, subject.into())
    }

    /// Rules written for `action` on `subject`, ignoring conditions.
    pub fn rules_for(
        &self,
        action: Action,
        subject: SubjectTag,
    ) -> impl DoubleEndedIterator<Item = &Rule> {
        self.rules.iter().filter(move |r| r.covers(action, subject))
    }

    /// Evaluation context handed to conditions for `resource`.
    pub fn context_for(&self, resource: &Resource) -> Result<Value, AuthzError> {
        if !resource.attributes.is_object() {
            return Err(AuthzError::MalformedResource(format!(
                "{} attributes must be a JSON object",
                resource.kind
            )));
        }
        Ok(json!({
            "principal": {
                "id": self.principal.id,
                "role": self.principal.role.as_str(),
            },
            "resource": resource.attributes,
        }))
    }
}
