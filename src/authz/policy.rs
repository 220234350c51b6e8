use kdl::{KdlDocument, KdlNode};

use crate::authz::ability::Effect;
use crate::authz::errors::AuthzError;

/// A role block as written in a policy file, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleDef {
    pub name: String,
    /// Roles whose rules are inherited, in order, ahead of this role's own rules
    pub includes: Vec<String>,
    pub rules: Vec<RuleDef>,
}

/// An `allow` or `deny` node, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDef {
    pub effect: Effect,
    /// e.g. ["read", "delete"]
    pub actions: Vec<String>,
    /// e.g. "Enrollment"
    pub subject: String,
    pub condition: Option<String>,
    pub reason: Option<String>,
}

/// Intermediate result from parsing a single KDL file.
#[derive(Debug, Clone, Default)]
pub struct ParsedPolicy {
    pub roles: Vec<RoleDef>,
}

/// Parse a KDL document string into role definitions.
pub fn parse_kdl_document(source: &str) -> Result<ParsedPolicy, AuthzError> {
    let doc: KdlDocument = source
        .parse()
        .map_err(|e: kdl::KdlError| AuthzError::KdlParse(e.to_string()))?;

    let mut policy = ParsedPolicy::default();

    for node in doc.nodes() {
        match node.name().value() {
            "role" => policy.roles.push(parse_role(node)?),
            other => {
                tracing::warn!("ignoring unknown top-level KDL node `{other}`");
            }
        }
    }

    Ok(policy)
}

fn parse_role(node: &KdlNode) -> Result<RoleDef, AuthzError> {
    let name = string_args(node).into_iter().next().ok_or_else(|| {
        AuthzError::InvalidPolicy(
            "role node requires a string argument (e.g. role \"student\")".into(),
        )
    })?;

    let mut includes = Vec::new();
    let mut rules = Vec::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "includes" => includes = dash_list(child),
                "allow" => rules.push(parse_rule(&name, Effect::Allow, child)?),
                "deny" => rules.push(parse_rule(&name, Effect::Deny, child)?),
                other => {
                    return Err(AuthzError::InvalidPolicy(format!(
                        "unexpected child `{other}` in role `{name}` (expected `allow`, `deny` or `includes`)"
                    )));
                }
            }
        }
    }

    Ok(RoleDef {
        name,
        includes,
        rules,
    })
}

fn parse_rule(role: &str, effect: Effect, node: &KdlNode) -> Result<RuleDef, AuthzError> {
    let kind = node.name().value();

    let actions = string_args(node);
    if actions.is_empty() {
        return Err(AuthzError::InvalidRule(format!(
            "`{kind}` in role `{role}` needs at least one action (e.g. {kind} \"read\" on=\"Enrollment\")"
        )));
    }

    let subject = string_prop(node, "on").ok_or_else(|| {
        AuthzError::InvalidRule(format!(
            "`{kind} {}` in role `{role}` missing `on` property (e.g. on=\"Enrollment\")",
            actions.join(" ")
        ))
    })?;

    Ok(RuleDef {
        effect,
        actions,
        subject,
        condition: string_prop(node, "when"),
        reason: string_prop(node, "reason"),
    })
}

/// All positional string arguments of a node, in order.
fn string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn string_prop(node: &KdlNode, key: &str) -> Option<String> {
    node.get(key)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

/// Extract dash-list children: nodes named "-" whose first argument is a string.
/// ```kdl
/// includes {
///     - "guest"
/// }
/// ```
fn dash_list(node: &KdlNode) -> Vec<String> {
    let Some(children) = node.children() else {
        return Vec::new();
    };
    children
        .nodes()
        .iter()
        .filter(|n| n.name().value() == "-")
        .filter_map(|n| string_args(n).into_iter().next())
        .collect()
}
