use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::authz::ability::{Effect, Rule};
use crate::authz::errors::AuthzError;
use crate::authz::policy::{parse_kdl_document, ParsedPolicy, RoleDef, RuleDef};
use crate::authz::types::{Action, Role, SubjectTag};
use crate::authz::RoleTemplates;

/// Rule templates shipped with the crate.
const DEFAULT_POLICY: &str = include_str!("../../policies/default.kdl");

/// Compile the built-in student / lecturer templates.
pub fn builtin_templates() -> Result<RoleTemplates, AuthzError> {
    compile_policies(vec![parse_kdl_document(DEFAULT_POLICY)?])
}

/// Templates from `dir` when given, otherwise the built-in ones.
pub fn load_or_builtin(dir: Option<&Path>) -> Result<RoleTemplates, AuthzError> {
    match dir {
        Some(dir) => load_policies(dir),
        None => {
            let templates = builtin_templates()?;
            tracing::info!(roles = templates.len(), "Loaded built-in rule templates");
            Ok(templates)
        }
    }
}

/// Load all `.kdl` policy files from the given directory and compile them
/// into a single immutable `RoleTemplates`.
pub fn load_policies(dir: &Path) -> Result<RoleTemplates, AuthzError> {
    if !dir.is_dir() {
        return Err(AuthzError::InvalidPolicy(format!(
            "policies directory `{}` does not exist or is not a directory",
            dir.display()
        )));
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "kdl").unwrap_or(false))
        .collect();
    entries.sort();

    let mut all_parsed = Vec::with_capacity(entries.len());
    for path in &entries {
        let contents =
            std::fs::read_to_string(path).map_err(|source| AuthzError::PolicyLoadError {
                path: path.display().to_string(),
                source,
            })?;
        all_parsed.push(parse_kdl_document(&contents)?);
    }

    let templates = compile_policies(all_parsed)?;

    tracing::info!(
        files = entries.len(),
        roles = templates.len(),
        dir = %dir.display(),
        "Loaded authorization policies"
    );

    Ok(templates)
}

/// Merge parsed policies and compile every role into its flattened rule list.
/// A role defined again in a later document replaces the earlier definition.
pub fn compile_policies(parsed: Vec<ParsedPolicy>) -> Result<RoleTemplates, AuthzError> {
    let mut roles: HashMap<String, RoleDef> = HashMap::new();
    for p in parsed {
        for role in p.roles {
            roles.insert(role.name.clone(), role);
        }
    }

    check_role_includes(&roles)?;

    let mut templates = RoleTemplates::new();
    for name in roles.keys() {
        let mut rules = Vec::new();
        collect_role_rules(name, &roles, &mut HashSet::new(), &mut rules)?;
        tracing::debug!(role = %name, rules = rules.len(), "compiled role template");
        templates.register_rules(Role::from(name.as_str()), rules);
    }

    Ok(templates)
}

/// Reject undefined includes and cycles in role inheritance.
fn check_role_includes(roles: &HashMap<String, RoleDef>) -> Result<(), AuthzError> {
    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();

    for name in roles.keys() {
        if !visited.contains(name.as_str()) {
            dfs_cycle_check(name, roles, &mut visited, &mut in_stack)?;
        }
    }
    Ok(())
}

fn dfs_cycle_check<'a>(
    name: &'a str,
    roles: &'a HashMap<String, RoleDef>,
    visited: &mut HashSet<&'a str>,
    in_stack: &mut HashSet<&'a str>,
) -> Result<(), AuthzError> {
    visited.insert(name);
    in_stack.insert(name);

    if let Some(role) = roles.get(name) {
        for included in &role.includes {
            if !roles.contains_key(included) {
                return Err(AuthzError::UndefinedRole(format!(
                    "{included} (included by {name})"
                )));
            }
            if in_stack.contains(included.as_str()) {
                return Err(AuthzError::CyclicRoleInheritance(format!(
                    "{name} -> {included}"
                )));
            }
            if !visited.contains(included.as_str()) {
                dfs_cycle_check(included, roles, visited, in_stack)?;
            }
        }
    }

    in_stack.remove(name);
    Ok(())
}

/// Append the rules of `role_name` to `out`: included roles first, in order,
/// then the role's own rules so they can override inherited ones.
fn collect_role_rules(
    role_name: &str,
    roles: &HashMap<String, RoleDef>,
    visited: &mut HashSet<String>,
    out: &mut Vec<Rule>,
) -> Result<(), AuthzError> {
    if !visited.insert(role_name.to_string()) {
        return Ok(());
    }
    let Some(role) = roles.get(role_name) else {
        return Err(AuthzError::UndefinedRole(role_name.to_string()));
    };

    for included in &role.includes {
        collect_role_rules(included, roles, visited, out)?;
    }
    for def in &role.rules {
        out.push(compile_rule(role_name, def)?);
    }
    Ok(())
}

fn compile_rule(role: &str, def: &RuleDef) -> Result<Rule, AuthzError> {
    let actions = def
        .actions
        .iter()
        .map(|a| a.parse::<Action>())
        .collect::<Result<Vec<_>, _>>()?;
    let subject: SubjectTag = def.subject.parse()?;

    let mut rule = match def.effect {
        Effect::Allow => Rule::allow(&actions, subject),
        Effect::Deny => Rule::deny(&actions, subject),
    };
    if let Some(cond) = &def.condition {
        rule = rule.when(cond).map_err(|e| {
            AuthzError::InvalidRule(format!("role `{role}`, rule on `{subject}`: {e}"))
        })?;
    }
    if let Some(reason) = &def.reason {
        rule = rule.because(reason.clone());
    }
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::builder::AbilityFactory;
    use crate::authz::types::Principal;

    fn role(name: &str, includes: &[&str], rules: Vec<RuleDef>) -> RoleDef {
        RoleDef {
            name: name.into(),
            includes: includes.iter().map(|s| s.to_string()).collect(),
            rules,
        }
    }

    fn rule(effect: Effect, actions: &[&str], subject: &str) -> RuleDef {
        RuleDef {
            effect,
            actions: actions.iter().map(|s| s.to_string()).collect(),
            subject: subject.into(),
            condition: None,
            reason: None,
        }
    }

    #[test]
    fn test_compile_basic() {
        let parsed = ParsedPolicy {
            roles: vec![role(
                "student",
                &[],
                vec![rule(Effect::Allow, &["read"], "Lecturer")],
            )],
        };
        let templates = compile_policies(vec![parsed]).unwrap();
        assert_eq!(templates.len(), 1);
        assert!(templates.contains(&Role::Student));
    }

    #[test]
    fn test_includes_come_first_and_can_be_overridden() {
        let parsed = ParsedPolicy {
            roles: vec![
                role("base", &[], vec![rule(Effect::Allow, &["manage"], "Student")]),
                role(
                    "lecturer",
                    &["base"],
                    vec![rule(Effect::Deny, &["update"], "Student")],
                ),
            ],
        };
        let templates = compile_policies(vec![parsed]).unwrap();
        let ability = templates
            .define_ability(&Principal::new("L1", Role::Lecturer))
            .unwrap();
        assert_eq!(ability.rules().len(), 2);
        assert_eq!(ability.rules()[0].effect, Effect::Allow);
        assert!(ability.can(Action::Read, SubjectTag::Student));
        assert!(!ability.can(Action::Update, SubjectTag::Student));
    }

    #[test]
    fn test_cyclic_roles_detected() {
        let parsed = ParsedPolicy {
            roles: vec![role("a", &["b"], vec![]), role("b", &["a"], vec![])],
        };
        let err = compile_policies(vec![parsed]).unwrap_err();
        assert!(matches!(err, AuthzError::CyclicRoleInheritance(_)));
    }

    #[test]
    fn test_undefined_include_detected() {
        let parsed = ParsedPolicy {
            roles: vec![role("student", &["ghost"], vec![])],
        };
        let err = compile_policies(vec![parsed]).unwrap_err();
        assert!(matches!(err, AuthzError::UndefinedRole(_)));
    }

    #[test]
    fn test_invalid_action_subject_and_condition() {
        let bad_action = ParsedPolicy {
            roles: vec![role("student", &[], vec![rule(Effect::Allow, &["destroy"], "Student")])],
        };
        assert!(matches!(
            compile_policies(vec![bad_action]).unwrap_err(),
            AuthzError::UnknownAction(_)
        ));

        let bad_subject = ParsedPolicy {
            roles: vec![role("student", &[], vec![rule(Effect::Allow, &["read"], "Course")])],
        };
        assert!(matches!(
            compile_policies(vec![bad_subject]).unwrap_err(),
            AuthzError::UnknownSubject(_)
        ));

        let mut conditioned = rule(Effect::Allow, &["read"], "Student");
        conditioned.condition = Some("resource.id ==".into());
        let bad_condition = ParsedPolicy {
            roles: vec![role("student", &[], vec![conditioned])],
        };
        assert!(matches!(
            compile_policies(vec![bad_condition]).unwrap_err(),
            AuthzError::InvalidRule(_)
        ));
    }

    #[test]
    fn test_later_document_replaces_role() {
        let p1 = ParsedPolicy {
            roles: vec![role("student", &[], vec![rule(Effect::Allow, &["read"], "Lecturer")])],
        };
        let p2 = ParsedPolicy {
            roles: vec![role("student", &[], vec![])],
        };
        let templates = compile_policies(vec![p1, p2]).unwrap();
        let ability = templates
            .define_ability(&Principal::new("S1", Role::Student))
            .unwrap();
        assert!(ability.rules().is_empty());
    }

    #[test]
    fn test_custom_role_names_are_registered() {
        let parsed = ParsedPolicy {
            roles: vec![role("dean", &[], vec![rule(Effect::Allow, &["read"], "Submission")])],
        };
        let templates = compile_policies(vec![parsed]).unwrap();
        let ability = templates
            .define_ability(&Principal::new("D1", Role::from("dean")))
            .unwrap();
        assert!(ability.can(Action::Read, SubjectTag::Submission));
    }

    #[test]
    fn test_builtin_templates_compile() {
        let templates = builtin_templates().unwrap();
        assert!(templates.contains(&Role::Student));
        assert!(templates.contains(&Role::Lecturer));
        assert!(!templates.contains(&Role::Guest));
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();

        std::fs::write(
            dir.path().join("10_student.kdl"),
            r#"
role "student" {
    allow "read" on="Lecturer"
}
"#,
        )
        .unwrap();

        std::fs::write(
            dir.path().join("20_lecturer.kdl"),
            r#"
role "lecturer" {
    allow "read" on="Student"
    deny "update" on="Student" reason="read only"
}
"#,
        )
        .unwrap();

        std::fs::write(dir.path().join("README.md"), "not a policy").unwrap();

        let templates = load_policies(dir.path()).unwrap();
        assert_eq!(templates.len(), 2);
        let lecturer = templates
            .define_ability(&Principal::new("L1", Role::Lecturer))
            .unwrap();
        assert_eq!(lecturer.rules().len(), 2);
        assert_eq!(lecturer.rules()[1].reason.as_deref(), Some("read only"));
    }

    #[test]
    fn test_load_nonexistent_directory() {
        let err = load_policies(Path::new("/nonexistent/path")).unwrap_err();
        assert!(matches!(err, AuthzError::InvalidPolicy(_)));
    }
}
