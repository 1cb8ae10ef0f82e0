//! HTTP API and WebSocket mount.
//!
//! A thin axum layer over [`DispatchService`]: handlers resolve the caller,
//! check the role and delegate. `GET /health` answers without identity.

pub mod api;
pub mod auth;
pub mod error;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::GlobalConfig;
use crate::dispatch::DispatchService;
use crate::gateway::ws::ws_handler;
use crate::{AppError, Result};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration, including the runtime API token.
    pub config: Arc<GlobalConfig>,
    /// Operation contract.
    pub dispatch: DispatchService,
}

/// Handler for `GET /health`.
async fn health() -> &'static str {
    "ok"
}

/// Build the full router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/dashboard/manager", get(api::manager_dashboard))
        .route("/api/dashboard/agent", get(api::agent_dashboard))
        .route("/api/auto-assign", post(api::auto_assign))
        .route("/api/manual-assign", post(api::manual_assign))
        .route("/api/clients", post(api::create_client))
        .route("/api/clients/import", post(api::import_clients))
        .route("/api/clients/status", post(api::override_client_status))
        .route("/api/users", post(api::create_user))
        .route("/api/agents/{id}/availability", post(api::set_agent_active))
        .route("/api/update-location", post(api::update_location))
        .route(
            "/api/update-assignment-status",
            post(api::update_assignment_status),
        )
        .route("/api/assignments/reassign", post(api::reassign))
        .route("/api/assignments/{id}/cancel", post(api::cancel_assignment))
        .route("/api/route", get(api::route))
        .route("/ws/operations/", get(ws_handler))
        .with_state(state)
}

/// Bind `config.bind_addr()` and serve until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if the listener cannot bind or the server fails.
pub async fn serve_http(state: AppState, ct: CancellationToken) -> Result<()> {
    let bind = state.config.bind_addr();
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|err| AppError::Io(format!("failed to bind HTTP on {bind}: {err}")))?;
    serve(listener, state, ct).await
}

/// Serve on an already bound listener until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve(listener: TcpListener, state: AppState, ct: CancellationToken) -> Result<()> {
    let local = listener
        .local_addr()
        .map_err(|err| AppError::Io(format!("listener has no address: {err}")))?;
    info!(%local, "starting HTTP API");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("HTTP server error: {err}")))?;

    info!("HTTP API shut down");
    Ok(())
}
