use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    #[error("Failed to load policy file `{path}`")]
    #[diagnostic(
        code(guidance_authz::authz::policy_load),
        help("Check that the file exists and contains valid KDL syntax")
    )]
    PolicyLoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy: {0}")]
    #[diagnostic(
        code(guidance_authz::authz::invalid_policy),
        help("Each policy file must contain `role` nodes with `allow`, `deny` or `includes` children")
    )]
    InvalidPolicy(String),

    #[error("Invalid rule: {0}")]
    #[diagnostic(
        code(guidance_authz::authz::invalid_rule),
        help("Rule syntax: allow \"read\" \"delete\" on=\"Enrollment\" when=\"resource.student_id == principal.id\" reason=\"...\"")
    )]
    InvalidRule(String),

    #[error("Invalid condition expression: {0}")]
    #[diagnostic(
        code(guidance_authz::authz::invalid_condition),
        help("Supported operators: ==, !=, >, <, >=, <=, &&, ||, !, in. Paths start at `principal` or `resource` (e.g. resource.student_id)")
    )]
    InvalidCondition(String),

    #[error("Unknown action `{0}`")]
    #[diagnostic(
        code(guidance_authz::authz::unknown_action),
        help("Valid actions: manage, create, read, update, delete, approve, review, submit")
    )]
    UnknownAction(String),

    #[error("Unknown subject `{0}`")]
    #[diagnostic(
        code(guidance_authz::authz::unknown_subject),
        help("Valid subjects: Student, Lecturer, Enrollment, GuidanceAgenda, Submission, Feedback")
    )]
    UnknownSubject(String),

    #[error("Undefined role `{0}`")]
    #[diagnostic(
        code(guidance_authz::authz::undefined_role),
        help("Define the role with: role \"<name>\" {{ allow ... }}")
    )]
    UndefinedRole(String),

    #[error("Cyclic role inheritance detected: {0}")]
    #[diagnostic(
        code(guidance_authz::authz::cyclic_roles),
        help("Check the `includes` lists in your role definitions for circular references")
    )]
    CyclicRoleInheritance(String),

    #[error("Malformed resource: {0}")]
    #[diagnostic(
        code(guidance_authz::authz::malformed_resource),
        help("Resources must serialize to a JSON object carrying their ownership fields")
    )]
    MalformedResource(String),

    #[error("Invalid request: {0}")]
    #[diagnostic(code(guidance_authz::authz::invalid_request))]
    InvalidRequest(String),

    #[error("KDL parse error: {0}")]
    #[diagnostic(
        code(guidance_authz::authz::kdl_parse),
        help("Check your KDL file syntax, see https://kdl.dev for the specification")
    )]
    KdlParse(String),

    #[error("I/O error: {0}")]
    #[diagnostic(code(guidance_authz::authz::io))]
    Io(#[from] std::io::Error),
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthzError::InvalidRequest(_)
            | AuthzError::UnknownAction(_)
            | AuthzError::UnknownSubject(_)
            | AuthzError::MalformedResource(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            _ => {
                tracing::error!(error = %self, "authorization fault");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal authorization error".to_string(),
                )
            }
        };
        let body = json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
