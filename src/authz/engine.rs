use crate::authz::ability::{Ability, Effect, Rule};
use crate::authz::errors::AuthzError;
use crate::authz::types::{Action, Subject};

/// Decide whether `ability` allows `action` on `subject`.
///
/// Rules are scanned in insertion order and the last matching rule decides.
/// Nothing matching means deny.
pub fn check(ability: &Ability, action: Action, subject: Subject<'_>) -> Result<bool, AuthzError> {
    Ok(matches!(
        relevant_rule(ability, action, subject)?,
        Some(rule) if rule.effect == Effect::Allow
    ))
}

/// The last rule that matches `action` on `subject`.
pub fn relevant_rule<'r>(
    ability: &'r Ability,
    action: Action,
    subject: Subject<'_>,
) -> Result<Option<&'r Rule>, AuthzError> {
    let tag = subject.tag();
    let mut context = None;

    for rule in ability.rules().iter().rev() {
        if !rule.covers(action, tag) {
            continue;
        }

        let Some(condition) = &rule.condition else {
            return Ok(Some(rule));
        };

        // A bare type cannot satisfy a field-level condition.
        let Subject::Instance(resource) = subject else {
            continue;
        };

        if context.is_none() {
            context = Some(ability.context_for(resource)?);
        }
        if let Some(ctx) = &context {
            if condition.evaluate(ctx)? {
                return Ok(Some(rule));
            }
        }
    }

    Ok(None)
}
