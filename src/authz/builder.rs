use std::collections::HashMap;
use std::sync::Arc;

use crate::authz::ability::{Ability, Rule};
use crate::authz::errors::AuthzError;
use crate::authz::types::{Principal, Role};
use crate::authz::RoleTemplates;

/// Produces the ability of a principal for the current request.
pub trait AbilityFactory: Send + Sync {
    fn define_ability(&self, principal: &Principal) -> Result<Ability, AuthzError>;
}

/// Rule-generating function registered for one role.
pub type RuleFn = Arc<dyn Fn(&Principal, &mut AbilityBuilder) -> Result<(), AuthzError> + Send + Sync>;

/// Accumulates rules for one principal in evaluation order.
#[derive(Debug)]
pub struct AbilityBuilder {
    principal: Principal,
    rules: Vec<Rule>,
}

impl AbilityBuilder {
    pub fn new(principal: Principal) -> Self {
        Self {
            principal,
            rules: Vec::new(),
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn push(&mut self, rule: Rule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = Rule>) -> &mut Self {
        self.rules.extend(rules);
        self
    }

    pub fn build(self) -> Ability {
        Ability::new(self.principal, self.rules)
    }
}

impl RoleTemplates {
    pub fn new() -> Self {
        Self {
            roles: HashMap::new(),
        }
    }

    /// Register the rule function for `role`, replacing any previous one.
    pub fn register_fn<F>(&mut self, role: Role, f: F) -> &mut Self
    where
        F: Fn(&Principal, &mut AbilityBuilder) -> Result<(), AuthzError> + Send + Sync + 'static,
    {
        self.roles.insert(role, Arc::new(f));
        self
    }

    /// Register a fixed rule list for `role`. Conditions refer to `principal.*`,
    /// so the same list serves every principal holding the role.
    pub fn register_rules(&mut self, role: Role, rules: Vec<Rule>) -> &mut Self {
        let rules: Arc<[Rule]> = rules.into();
        self.register_fn(role, move |_, builder| {
            builder.extend(rules.iter().cloned());
            Ok(())
        })
    }

    pub fn contains(&self, role: &Role) -> bool {
        self.roles.contains_key(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.keys()
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl Default for RoleTemplates {
    fn default() -> Self {
        Self::new()
    }
}

impl AbilityFactory for RoleTemplates {
    fn define_ability(&self, principal: &Principal) -> Result<Ability, AuthzError> {
        let mut builder = AbilityBuilder::new(principal.clone());
        match self.roles.get(&principal.role) {
            Some(define) => define(principal, &mut builder)?,
            None => {
                tracing::debug!(role = %principal.role, "no rule template for role, ability is empty");
            }
        }
        Ok(builder.build())
    }
}
