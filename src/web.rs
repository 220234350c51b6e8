use std::net::SocketAddr;
use std::sync::Arc;

use miette::Result;

use crate::authz::audit::TracingAudit;
use crate::authz::gate::Gate;
use crate::authz::web::{router, AppState};
use crate::authz::{catalog, RoleTemplates};
use crate::errors::ServiceError;
use crate::settings::Settings;

/// Build the decision API state from loaded templates and settings.
pub fn app_state(settings: &Settings, templates: RoleTemplates) -> AppState {
    let audit = TracingAudit {
        decisions: settings.audit.decisions,
    };
    AppState {
        gate: Gate::with_audit(Arc::new(templates), Arc::new(audit)),
        operations: Arc::new(catalog::operations()),
        expose_abilities: settings.api.expose_abilities,
    }
}

pub async fn serve(settings: Settings, templates: RoleTemplates) -> Result<()> {
    let addr: SocketAddr = settings
        .listen_addr()
        .parse()
        .map_err(|_| ServiceError::BadAddress(settings.listen_addr()))?;

    let state = app_state(&settings, templates);
    tracing::info!(operations = state.operations.len(), "Operation catalog ready");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(ServiceError::Io)?;
    tracing::info!(%addr, "Authorization decision API listening");
    axum::serve(listener, router(state))
        .await
        .map_err(ServiceError::Io)?;
    Ok(())
}
