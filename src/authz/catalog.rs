//! Guarded operations of the guidance backend, keyed `"<entity>.<verb>"`.
//!
//! Operations on an existing record (and creation of owner-scoped records) use
//! [`OwnershipPolicy`], so the loaded record is checked against the rule
//! conditions. Creation of unscoped records is checked by type. `.list`
//! operations pass when the principal may read at least part of the collection;
//! narrowing the listing to readable rows is up to the caller. Account
//! operations (`account.*`) are gated by role alone.

use std::sync::Arc;

use crate::authz::gate::{Operation, Operations};
use crate::authz::handlers::{
    OwnershipPolicy, PolicyFn, PolicyHandler, ResourcePolicy, RolePolicy,
};
use crate::authz::types::{Action, Role, SubjectTag};

struct Entry {
    key: &'static str,
    subject: SubjectTag,
    /// Checked against the loaded (or drafted) record
    instance: &'static [Action],
    /// Checked against the entity type
    by_type: &'static [Action],
}

const CATALOG: [Entry; 6] = [
    Entry {
        key: "students",
        subject: SubjectTag::Student,
        instance: &[Action::Read, Action::Update, Action::Delete],
        by_type: &[Action::Create],
    },
    Entry {
        key: "lecturers",
        subject: SubjectTag::Lecturer,
        instance: &[Action::Read, Action::Update, Action::Delete],
        by_type: &[Action::Create],
    },
    Entry {
        key: "enrollments",
        subject: SubjectTag::Enrollment,
        instance: &[Action::Read, Action::Delete, Action::Approve],
        by_type: &[Action::Create],
    },
    Entry {
        key: "agendas",
        subject: SubjectTag::GuidanceAgenda,
        instance: &[Action::Create, Action::Read, Action::Update, Action::Delete],
        by_type: &[],
    },
    Entry {
        key: "submissions",
        subject: SubjectTag::Submission,
        instance: &[
            Action::Create,
            Action::Read,
            Action::Update,
            Action::Submit,
            Action::Review,
            Action::Approve,
        ],
        by_type: &[],
    },
    Entry {
        key: "feedback",
        subject: SubjectTag::Feedback,
        instance: &[Action::Create, Action::Read, Action::Update, Action::Delete],
        by_type: &[],
    },
];

/// Every catalog operation.
pub fn operations() -> Operations {
    let mut ops = Operations::new();
    for entry in &CATALOG {
        for &action in entry.instance {
            let name = operation_name(entry.key, action);
            let handler = OwnershipPolicy::new(action, entry.subject).named(name.clone());
            ops.register(Operation::new(name).guarded_by(handler));
        }
        for &action in entry.by_type {
            let name = operation_name(entry.key, action);
            let handler = ResourcePolicy::new(action, entry.subject).named(name.clone());
            ops.register(Operation::new(name).guarded_by(handler));
        }
        let list = format!("{}.list", entry.key);
        ops.register(Operation::new(list.clone()).guarded_by_shared(may_list(list, entry.subject)));
    }
    for (name, roles) in account_operations() {
        ops.register(Operation::new(name).guarded_by(RolePolicy::new(roles).named(name)));
    }
    ops
}

fn account_operations() -> [(&'static str, Vec<Role>); 3] {
    [
        ("account.student_me", vec![Role::Student]),
        ("account.lecturer_me", vec![Role::Lecturer]),
        ("account.logout", vec![Role::Student, Role::Lecturer]),
    ]
}

/// Catalog key of the entity a subject belongs to.
pub fn entity_key(subject: SubjectTag) -> &'static str {
    CATALOG
        .iter()
        .find(|e| e.subject == subject)
        .map(|e| e.key)
        .unwrap_or("unknown")
}

fn operation_name(key: &str, action: Action) -> String {
    format!("{key}.{action}")
}

/// Passes when reading is granted by type, or when a conditioned read grant
/// exists that no later unconditioned rule overrides.
fn may_list(name: String, subject: SubjectTag) -> Arc<dyn PolicyHandler> {
    Arc::new(PolicyFn::new(name, move |ability, _| {
        if ability.check(Action::Read, subject)? {
            return Ok(true);
        }
        for rule in ability.rules_for(Action::Read, subject).rev() {
            match (rule.is_inverted(), rule.condition.is_some()) {
                (false, _) => return Ok(true),
                (true, false) => return Ok(false),
                (true, true) => continue,
            }
        }
        Ok(false)
    }))
}
