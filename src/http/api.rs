//! JSON handlers for the dispatch API.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::dispatch::{AgentDashboard, AutoAssignReport, ManagerDashboard, NewUser, RouteEstimate};
use crate::models::assignment::{Assignment, AssignmentStatus};
use crate::models::client::{Client, ClientStatus, NewClient};
use crate::models::import::{ImportLog, ImportRow};
use crate::models::location::{LocationFix, LocationLog};
use crate::models::user::User;
use crate::{AppError, Result};

use super::auth::Identity;
use super::AppState;

/// Body of `POST /api/manual-assign`.
#[derive(Debug, Deserialize)]
pub struct ManualAssignRequest {
    /// Agent to assign.
    pub agent_id: String,
    /// Pending client to serve.
    pub client_id: String,
}

/// Body of `POST /api/clients/import`.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    /// Source file name, kept for the audit record.
    pub file_name: String,
    /// Parsed spreadsheet rows.
    pub rows: Vec<ImportRow>,
}

/// Body of `POST /api/clients/status`.
#[derive(Debug, Deserialize)]
pub struct ClientStatusRequest {
    /// Clients to update.
    pub client_ids: Vec<String>,
    /// `pending` or `completed`.
    pub status: ClientStatus,
}

/// Body of `POST /api/agents/{id}/availability`.
#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    /// Whether the agent takes new work.
    pub active: bool,
}

/// Body of `POST /api/update-location`.
#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// GPS accuracy in metres.
    #[serde(default)]
    pub accuracy: Option<f64>,
}

/// Body of `POST /api/update-assignment-status`.
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    /// Assignment to advance.
    pub assignment_id: String,
    /// Target status name.
    pub status: String,
    /// Completion notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Body of `POST /api/assignments/reassign`.
#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    /// Assignments to delete.
    pub assignment_ids: Vec<String>,
}

/// Query of `GET /api/route`.
#[derive(Debug, Deserialize)]
pub struct RouteQuery {
    /// Start latitude.
    pub start_lat: f64,
    /// Start longitude.
    pub start_lng: f64,
    /// End latitude.
    pub end_lat: f64,
    /// End longitude.
    pub end_lng: f64,
}

/// Response of `POST /api/assignments/reassign`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReassignOutcome {
    /// Assignments removed.
    pub deleted: usize,
}

/// Response of `POST /api/clients/status`.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverrideOutcome {
    /// Clients whose status changed.
    pub updated: usize,
}

/// `GET /api/dashboard/manager`.
///
/// # Errors
///
/// Returns `AppError::Forbidden` for agents.
pub async fn manager_dashboard(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<ManagerDashboard>> {
    identity.require_manager()?;
    Ok(Json(state.dispatch.manager_dashboard().await?))
}

/// `GET /api/dashboard/agent`.
///
/// # Errors
///
/// Returns `AppError::Forbidden` for managers.
pub async fn agent_dashboard(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<AgentDashboard>> {
    let agent = identity.require_agent()?;
    Ok(Json(state.dispatch.agent_dashboard(&agent.id).await?))
}

/// `POST /api/auto-assign`.
///
/// # Errors
///
/// Returns `AppError::Forbidden` for agents.
pub async fn auto_assign(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<AutoAssignReport>> {
    identity.require_manager()?;
    Ok(Json(state.dispatch.auto_assign().await?))
}

/// `POST /api/manual-assign`.
///
/// # Errors
///
/// Returns the `manual_assign` failures, or `AppError::Forbidden` for
/// agents.
pub async fn manual_assign(
    State(state): State<AppState>,
    identity: Identity,
    body: std::result::Result<Json<ManualAssignRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Assignment>)> {
    identity.require_manager()?;
    let Json(body) = body?;
    let assignment = state
        .dispatch
        .manual_assign(&body.agent_id, &body.client_id)
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

/// `POST /api/clients`.
///
/// # Errors
///
/// Returns `AppError::MalformedInput` for invalid fields, or
/// `AppError::Forbidden` for agents.
pub async fn create_client(
    State(state): State<AppState>,
    identity: Identity,
    body: std::result::Result<Json<NewClient>, JsonRejection>,
) -> Result<(StatusCode, Json<Client>)> {
    identity.require_manager()?;
    let Json(fields) = body?;
    let client = state.dispatch.create_client(fields).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

/// `POST /api/clients/import`.
///
/// # Errors
///
/// Returns `AppError::Forbidden` for agents.
pub async fn import_clients(
    State(state): State<AppState>,
    identity: Identity,
    body: std::result::Result<Json<ImportRequest>, JsonRejection>,
) -> Result<Json<ImportLog>> {
    let manager = identity.require_manager()?;
    let Json(body) = body?;
    let log = state
        .dispatch
        .import_clients(&manager.id, &body.file_name, body.rows)
        .await?;
    Ok(Json(log))
}

/// `POST /api/clients/status`.
///
/// # Errors
///
/// Returns `AppError::MalformedInput` for statuses other than pending or
/// completed, or `AppError::Forbidden` for agents.
pub async fn override_client_status(
    State(state): State<AppState>,
    identity: Identity,
    body: std::result::Result<Json<ClientStatusRequest>, JsonRejection>,
) -> Result<Json<OverrideOutcome>> {
    identity.require_manager()?;
    let Json(body) = body?;
    let updated = state
        .dispatch
        .override_client_status(&body.client_ids, body.status)
        .await?;
    Ok(Json(OverrideOutcome { updated }))
}

/// `POST /api/users`.
///
/// # Errors
///
/// Returns `AppError::MalformedInput` for a blank or taken username, or
/// `AppError::Forbidden` for agents.
pub async fn create_user(
    State(state): State<AppState>,
    identity: Identity,
    body: std::result::Result<Json<NewUser>, JsonRejection>,
) -> Result<(StatusCode, Json<User>)> {
    identity.require_manager()?;
    let Json(fields) = body?;
    let user = state.dispatch.create_user(fields).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /api/agents/{id}/availability`.
///
/// # Errors
///
/// Returns `AppError::NotFound` for unknown agents, or
/// `AppError::Forbidden` for agents.
pub async fn set_agent_active(
    State(state): State<AppState>,
    identity: Identity,
    Path(agent_id): Path<String>,
    body: std::result::Result<Json<AvailabilityRequest>, JsonRejection>,
) -> Result<StatusCode> {
    identity.require_manager()?;
    let Json(body) = body?;
    state.dispatch.set_agent_active(&agent_id, body.active).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/update-location`, for the calling agent.
///
/// # Errors
///
/// Returns `AppError::MalformedInput` for missing or non-numeric
/// coordinates, or `AppError::Forbidden` for managers.
pub async fn update_location(
    State(state): State<AppState>,
    identity: Identity,
    body: std::result::Result<Json<LocationRequest>, JsonRejection>,
) -> Result<Json<LocationLog>> {
    let agent = identity.require_agent()?;
    let Json(body) = body?;
    if !(body.latitude.is_finite() && body.longitude.is_finite()) {
        return Err(AppError::MalformedInput("Invalid location data".into()));
    }
    let fix = LocationFix {
        latitude: body.latitude,
        longitude: body.longitude,
        accuracy: body.accuracy,
    };
    let log = state.dispatch.report_location(&agent.id, fix, None).await?;
    Ok(Json(log))
}

/// `POST /api/update-assignment-status`, for the calling agent's own
/// assignment.
///
/// # Errors
///
/// Returns `AppError::NotFound` for another agent's assignment,
/// `AppError::MalformedInput` for an unknown status name, and the
/// lifecycle failures of `advance_assignment`.
pub async fn update_assignment_status(
    State(state): State<AppState>,
    identity: Identity,
    body: std::result::Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<Assignment>> {
    let agent = identity.require_agent()?;
    let Json(body) = body?;
    let status = AssignmentStatus::parse(&body.status)
        .ok_or_else(|| AppError::MalformedInput(format!("unknown status {}", body.status)))?;
    let assignment = state
        .dispatch
        .advance_assignment(&body.assignment_id, &agent.id, status, body.notes)
        .await?;
    Ok(Json(assignment))
}

/// `POST /api/assignments/reassign`.
///
/// # Errors
///
/// Returns `AppError::Forbidden` for agents.
pub async fn reassign(
    State(state): State<AppState>,
    identity: Identity,
    body: std::result::Result<Json<ReassignRequest>, JsonRejection>,
) -> Result<Json<ReassignOutcome>> {
    identity.require_manager()?;
    let Json(body) = body?;
    let deleted = state
        .dispatch
        .reassign_to_pending(&body.assignment_ids)
        .await?;
    Ok(Json(ReassignOutcome { deleted }))
}

/// `POST /api/assignments/{id}/cancel`.
///
/// # Errors
///
/// Returns `AppError::NotFound`, `AppError::TerminalState`, or
/// `AppError::Forbidden` for agents.
pub async fn cancel_assignment(
    State(state): State<AppState>,
    identity: Identity,
    Path(assignment_id): Path<String>,
) -> Result<Json<Assignment>> {
    identity.require_manager()?;
    Ok(Json(state.dispatch.cancel_assignment(&assignment_id).await?))
}

/// `GET /api/route`.
///
/// # Errors
///
/// Returns `AppError::MalformedInput` for missing or non-numeric
/// coordinates.
pub async fn route(
    State(state): State<AppState>,
    _identity: Identity,
    query: std::result::Result<Query<RouteQuery>, QueryRejection>,
) -> Result<Json<RouteEstimate>> {
    let Query(q) = query?;
    Ok(Json(
        state
            .dispatch
            .route((q.start_lat, q.start_lng), (q.end_lat, q.end_lng)),
    ))
}
