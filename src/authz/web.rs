use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::authz::audit::log_permission_check;
use crate::authz::builder::AbilityFactory;
use crate::authz::errors::AuthzError;
use crate::authz::gate::{Decision, DenialCode, Gate, Operations};
use crate::authz::types::{
    AbilitiesRequest, Action, AuthorizeRequest, AuthorizeResponse, CheckRequest, CheckResponse,
    Subject, SubjectTag,
};
use crate::authz::RoleTemplates;

#[derive(Clone)]
pub struct AppState {
    pub gate: Gate<RoleTemplates>,
    pub operations: Arc<Operations>,
    /// Serve `/v1/abilities`. Off unless the deployment opts in, since it
    /// reveals the rule set of any named principal.
    pub expose_abilities: bool,
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/v1/authorize", post(handle_authorize))
        .route("/v1/check", post(handle_check))
        .route("/healthz", get(health));
    if state.expose_abilities {
        router = router.route("/v1/abilities", post(handle_abilities));
    }
    router.with_state(state)
}

async fn handle_authorize(
    State(state): State<AppState>,
    Json(req): Json<AuthorizeRequest>,
) -> Response {
    let Some(operation) = state.operations.get(&req.operation) else {
        return AuthzError::InvalidRequest(format!("unknown operation `{}`", req.operation))
            .into_response();
    };
    match state
        .gate
        .authorize(req.principal.as_ref(), operation, req.resource.as_ref())
    {
        Ok(Decision::Allowed) => Json(AuthorizeResponse { allowed: true }).into_response(),
        Ok(Decision::Denied(denial)) => {
            let status = match denial.code {
                DenialCode::Unauthenticated => StatusCode::UNAUTHORIZED,
                DenialCode::Forbidden => StatusCode::FORBIDDEN,
            };
            (status, Json(denial)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

async fn handle_check(State(state): State<AppState>, Json(req): Json<CheckRequest>) -> Response {
    match check(&state, &req) {
        Ok(allowed) => Json(CheckResponse { allowed }).into_response(),
        Err(e) => e.into_response(),
    }
}

fn check(state: &AppState, req: &CheckRequest) -> Result<bool, AuthzError> {
    let action: Action = req.action.parse()?;
    let tag: SubjectTag = req.subject.parse()?;
    let subject = match &req.resource {
        Some(resource) if resource.kind != tag => {
            return Err(AuthzError::MalformedResource(format!(
                "resource is a {} but the check is on {tag}",
                resource.kind
            )));
        }
        Some(resource) => Subject::Instance(resource),
        None => Subject::Type(tag),
    };

    let ability = state.gate.factory().define_ability(&req.principal)?;
    let allowed = ability.check(action, subject)?;
    log_permission_check(
        &req.principal.id,
        action,
        tag,
        allowed,
        req.resource.as_ref().and_then(|r| r.id()),
    );
    Ok(allowed)
}

async fn handle_abilities(
    State(state): State<AppState>,
    Json(req): Json<AbilitiesRequest>,
) -> Response {
    match state.gate.factory().define_ability(&req.principal) {
        Ok(ability) => Json(json!({
            "principal": ability.principal(),
            "rules": ability.rules(),
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
