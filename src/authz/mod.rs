pub mod ability;
pub mod audit;
pub mod builder;
pub mod catalog;
pub mod condition;
pub mod engine;
pub mod errors;
pub mod gate;
pub mod handlers;
pub mod loader;
pub mod policy;
pub mod types;
pub mod web;

use std::collections::HashMap;

pub use ability::{Ability, Effect, Rule};
pub use builder::{AbilityBuilder, AbilityFactory};
pub use errors::AuthzError;
pub use gate::{Decision, Denial, DenialCode, Gate, Operation, Operations};
pub use types::{Action, Principal, Resource, Role, Subject, SubjectTag};

/// Rule functions per role, compiled from policy files or registered in code.
/// Immutable once handed to a [`Gate`]; a policy change means building a new one.
pub struct RoleTemplates {
    roles: HashMap<Role, builder::RuleFn>,
}

impl std::fmt::Debug for RoleTemplates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut roles: Vec<&str> = self.roles.keys().map(Role::as_str).collect();
        roles.sort_unstable();
        f.debug_struct("RoleTemplates").field("roles", &roles).finish()
    }
}
