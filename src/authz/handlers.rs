use crate::authz::ability::Ability;
use crate::authz::condition::Condition;
use crate::authz::errors::AuthzError;
use crate::authz::types::{Action, Resource, Role, Subject, SubjectTag};

/// A reusable check attached to an operation. Handlers are pure predicates over
/// the ability they are given; an `Err` is a handler fault, not a decision.
pub trait PolicyHandler: Send + Sync {
    fn name(&self) -> &str;

    /// The (action, subject) pair this handler checks, when it has one.
    fn target(&self) -> Option<(Action, SubjectTag)> {
        None
    }

    fn handle(&self, ability: &Ability, resource: Option<&Resource>) -> Result<bool, AuthzError>;
}

/// Checks one (action, subject) pair.
///
/// Without conditions the check is always type-level, even when the caller
/// supplies a loaded resource. With conditions, a supplied resource is checked
/// as an instance and must also satisfy the handler's own condition.
#[derive(Debug, Clone)]
pub struct ResourcePolicy {
    name: String,
    action: Action,
    subject: SubjectTag,
    conditions: Option<Condition>,
}

impl ResourcePolicy {
    pub fn new(action: Action, subject: SubjectTag) -> Self {
        Self {
            name: format!("{action}:{subject}"),
            action,
            subject,
            conditions: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_conditions(mut self, expr: &str) -> Result<Self, AuthzError> {
        self.conditions = Some(Condition::parse(expr)?);
        Ok(self)
    }

    pub fn conditions(&self) -> Option<&Condition> {
        self.conditions.as_ref()
    }
}

impl PolicyHandler for ResourcePolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> Option<(Action, SubjectTag)> {
        Some((self.action, self.subject))
    }

    fn handle(&self, ability: &Ability, resource: Option<&Resource>) -> Result<bool, AuthzError> {
        match (resource, &self.conditions) {
            (Some(resource), Some(_)) if resource.kind != self.subject => {
                Err(AuthzError::MalformedResource(format!(
                    "{} handler received a {} resource",
                    self.name, resource.kind
                )))
            }
            (Some(resource), Some(conditions)) => {
                if !ability.check(self.action, Subject::Instance(resource))? {
                    return Ok(false);
                }
                conditions.evaluate(&ability.context_for(resource)?)
            }
            _ => ability.check(self.action, Subject::Type(self.subject)),
        }
    }
}

/// Checks one (action, subject) pair against the loaded resource whenever one is
/// supplied, falling back to a type-level check otherwise.
#[derive(Debug, Clone)]
pub struct OwnershipPolicy {
    name: String,
    action: Action,
    subject: SubjectTag,
}

impl OwnershipPolicy {
    pub fn new(action: Action, subject: SubjectTag) -> Self {
        Self {
            name: format!("{action}:{subject}:owned"),
            action,
            subject,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl PolicyHandler for OwnershipPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> Option<(Action, SubjectTag)> {
        Some((self.action, self.subject))
    }

    fn handle(&self, ability: &Ability, resource: Option<&Resource>) -> Result<bool, AuthzError> {
        match resource {
            Some(resource) if resource.kind != self.subject => Err(AuthzError::MalformedResource(
                format!("{} handler received a {} resource", self.name, resource.kind),
            )),
            Some(resource) => ability.check(self.action, Subject::Instance(resource)),
            None => ability.check(self.action, Subject::Type(self.subject)),
        }
    }
}

/// Passes when the principal holds one of the listed roles. An empty list
/// requires nothing.
#[derive(Debug, Clone)]
pub struct RolePolicy {
    name: String,
    roles: Vec<Role>,
}

impl RolePolicy {
    pub fn new<R: Into<Role>>(roles: impl IntoIterator<Item = R>) -> Self {
        let roles: Vec<Role> = roles.into_iter().map(Into::into).collect();
        let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
        Self {
            name: format!("roles:{}", names.join("|")),
            roles,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }
}

impl PolicyHandler for RolePolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, ability: &Ability, _resource: Option<&Resource>) -> Result<bool, AuthzError> {
        Ok(self.roles.is_empty() || self.roles.contains(&ability.principal().role))
    }
}

type HandlerFn =
    dyn Fn(&Ability, Option<&Resource>) -> Result<bool, AuthzError> + Send + Sync;

/// A named closure, for checks that do not reduce to a single (action, subject).
pub struct PolicyFn {
    name: String,
    f: Box<HandlerFn>,
}

impl PolicyFn {
    pub fn new<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Ability, Option<&Resource>) -> Result<bool, AuthzError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl std::fmt::Debug for PolicyFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyFn").field("name", &self.name).finish()
    }
}

impl PolicyHandler for PolicyFn {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, ability: &Ability, resource: Option<&Resource>) -> Result<bool, AuthzError> {
        (self.f)(ability, resource)
    }
}
