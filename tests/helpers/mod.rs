pub mod builders;

use std::sync::Arc;

use guidance_authz::authz::audit::NoopAudit;
use guidance_authz::authz::gate::Gate;
use guidance_authz::authz::{loader, Principal, Role, RoleTemplates};

pub use builders::{
    AgendaBuilder, EnrollmentBuilder, FeedbackBuilder, SubmissionBuilder,
};

pub fn student(id: &str) -> Principal {
    Principal::new(id, Role::Student)
}

pub fn lecturer(id: &str) -> Principal {
    Principal::new(id, Role::Lecturer)
}

/// Gate over the built-in templates, with auditing switched off.
pub fn builtin_gate() -> Gate<RoleTemplates> {
    let templates = loader::builtin_templates().expect("built-in templates should compile");
    Gate::with_audit(Arc::new(templates), Arc::new(NoopAudit))
}
