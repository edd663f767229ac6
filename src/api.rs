//! REST API over per-date assignment sessions.
//!
//! One session per dispatcher and date: open it, tap drivers and vehicles,
//! run the auto-assign pass, confirm. The handlers never hold the session
//! map lock across an await; auto-assign and confirm run in spawned tasks so
//! an abandoned request still releases the session's busy flag.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::autoassign::{self, AutoAssignOutcome};
use crate::backend::Backend;
use crate::controller::{DriverSelection, SelectionController, VehicleSelection};
use crate::demo_data;
use crate::domain::{Assignment, Driver, RosterDate, Vehicle};
use crate::session::{RosterSession, SessionError};
use crate::store::{AssignmentStore, StoreError};

/// Application state shared across handlers.
///
/// Holds the open sessions and the store they persist through.
pub struct AppState<B> {
    backend: Arc<B>,
    store: AssignmentStore<B>,
    dsp_code: String,
    sessions: RwLock<HashMap<Uuid, SessionEntry>>,
}

struct SessionEntry {
    session: RosterSession,
    controller: SelectionController,
}

impl<B: Backend> AppState<B> {
    pub fn new(backend: Arc<B>, dsp_code: impl Into<String>, status_id: impl Into<String>) -> Self {
        let dsp_code = dsp_code.into();
        Self {
            store: AssignmentStore::new(backend.clone(), dsp_code.clone(), status_id),
            backend,
            dsp_code,
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

// ============================================================================
// DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub date: RosterDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectDriverRequest {
    pub driver_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectVehicleRequest {
    pub vehicle_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnassignRequest {
    pub driver_id: String,
}

/// Snapshot of a session as the UI renders it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterView {
    pub session_id: Uuid,
    pub date: RosterDate,
    pub drivers: Vec<Driver>,
    pub vehicles: Vec<Vehicle>,
    /// Merged view: pending edits shadow persisted records.
    pub assignments: Vec<Assignment>,
    pub pending_count: usize,
    pub pending_driver: Option<String>,
    pub busy: bool,
}

fn view(id: Uuid, entry: &SessionEntry) -> RosterView {
    RosterView {
        session_id: id,
        date: entry.session.date(),
        drivers: entry.session.drivers().to_vec(),
        vehicles: entry.session.vehicles().to_vec(),
        assignments: entry.session.assignments(),
        pending_count: entry.session.pending().len(),
        pending_driver: entry.controller.pending_driver().map(str::to_string),
        busy: entry.session.is_busy(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResponse {
    pub action: &'static str,
    pub roster: RosterView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoAssignResponse {
    /// Informational status line, also set when nothing could be assigned.
    pub outcome: String,
    pub created: Vec<Assignment>,
    pub roster: RosterView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    pub persisted: usize,
    pub roster: RosterView,
}

// ============================================================================
// Errors
// ============================================================================

/// API-level error mapping for the engine's taxonomy.
#[derive(Debug)]
pub enum ApiError {
    SessionNotFound,
    Busy,
    Conflict(String),
    WriteFailed(String),
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::SessionNotFound => (
                StatusCode::NOT_FOUND,
                "session_not_found",
                "no such session".to_string(),
            ),
            Self::Busy => (
                StatusCode::CONFLICT,
                "busy",
                "another operation is in flight for this session".to_string(),
            ),
            Self::Conflict(message) => (StatusCode::CONFLICT, "conflict", message),
            Self::WriteFailed(message) => (StatusCode::BAD_GATEWAY, "write_failed", message),
            Self::Internal(message) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        };
        (status, Json(ErrorBody { code, message })).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(error: SessionError) -> Self {
        match error {
            SessionError::Busy => Self::Busy,
            SessionError::VehicleTaken { .. } => Self::Conflict(error.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict { .. } => Self::Conflict(error.to_string()),
            StoreError::Backend { .. } => Self::WriteFailed(error.to_string()),
        }
    }
}

// ============================================================================
// Router and handlers
// ============================================================================

/// Creates the API router.
pub fn router<B: Backend + 'static>(state: Arc<AppState<B>>) -> Router {
    Router::new()
        // Health & Info
        .route("/health", get(health))
        .route("/info", get(info))
        // Demo data
        .route("/demo-data", get(list_demo_data))
        // Sessions
        .route("/sessions", post(open_session::<B>).get(list_sessions::<B>))
        .route(
            "/sessions/{id}",
            get(get_session::<B>).delete(close_session::<B>),
        )
        .route("/sessions/{id}/select-driver", post(select_driver::<B>))
        .route("/sessions/{id}/select-vehicle", post(select_vehicle::<B>))
        .route("/sessions/{id}/unassign", post(unassign::<B>))
        .route("/sessions/{id}/auto-assign", post(auto_assign::<B>))
        .route("/sessions/{id}/confirm", post(confirm::<B>))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health - Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP" })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub heuristic: &'static str,
}

/// GET /info - Application info endpoint.
async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Van Assignment",
        version: env!("CARGO_PKG_VERSION"),
        heuristic: "greedy, previous-day affinity",
    })
}

/// GET /demo-data - List available demo data sets.
async fn list_demo_data() -> Json<Vec<&'static str>> {
    Json(demo_data::list_demo_data())
}

/// POST /sessions - Load the roster for a date and open an editing session.
async fn open_session<B: Backend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Json(request): Json<OpenSessionRequest>,
) -> Json<RosterView> {
    let session = RosterSession::load(
        state.backend.as_ref(),
        &state.store,
        &state.dsp_code,
        request.date,
    )
    .await;

    let id = Uuid::new_v4();
    let entry = SessionEntry {
        session,
        controller: SelectionController::new(),
    };
    let roster = view(id, &entry);
    state.sessions.write().insert(id, entry);
    Json(roster)
}

/// GET /sessions - List open session IDs.
async fn list_sessions<B: Backend + 'static>(
    State(state): State<Arc<AppState<B>>>,
) -> Json<Vec<Uuid>> {
    Json(state.sessions.read().keys().copied().collect())
}

/// GET /sessions/{id} - Current roster view of a session.
async fn get_session<B: Backend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<RosterView>, ApiError> {
    let sessions = state.sessions.read();
    let entry = sessions.get(&id).ok_or(ApiError::SessionNotFound)?;
    Ok(Json(view(id, entry)))
}

/// DELETE /sessions/{id} - Discard a session and its pending edits.
///
/// Nothing is persisted or rolled back; the store stays the source of truth.
async fn close_session<B: Backend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    match state.sessions.write().remove(&id) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

/// POST /sessions/{id}/select-driver - Tap a driver row.
async fn select_driver<B: Backend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectDriverRequest>,
) -> Result<Json<SelectionResponse>, ApiError> {
    let mut sessions = state.sessions.write();
    let entry = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound)?;

    let action = match entry
        .controller
        .select_driver(&mut entry.session, &request.driver_id)
    {
        DriverSelection::Pending { .. } => "pending",
        DriverSelection::Cancelled { .. } => "cancelled",
    };
    Ok(Json(SelectionResponse {
        action,
        roster: view(id, entry),
    }))
}

/// POST /sessions/{id}/select-vehicle - Tap a vehicle row.
///
/// 409 when the vehicle is already taken; the driver stays selected.
async fn select_vehicle<B: Backend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<Uuid>,
    Json(request): Json<SelectVehicleRequest>,
) -> Result<Json<SelectionResponse>, ApiError> {
    let mut sessions = state.sessions.write();
    let entry = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound)?;

    let action = match entry
        .controller
        .select_vehicle(&mut entry.session, &request.vehicle_id)?
    {
        VehicleSelection::Paired(_) => "paired",
        VehicleSelection::NoDriverPending => "noDriverPending",
    };
    Ok(Json(SelectionResponse {
        action,
        roster: view(id, entry),
    }))
}

/// POST /sessions/{id}/unassign - Hold gesture on an assigned driver.
///
/// Persisted assignments are deleted from the store first; pending ones are
/// simply discarded. Either way the selection machine returns to idle.
async fn unassign<B: Backend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<Uuid>,
    Json(request): Json<UnassignRequest>,
) -> Result<Json<SelectionResponse>, ApiError> {
    let (date, persisted) = {
        let sessions = state.sessions.read();
        let entry = sessions.get(&id).ok_or(ApiError::SessionNotFound)?;
        (
            entry.session.date(),
            entry.session.has_confirmed(&request.driver_id),
        )
    };

    if persisted {
        state.store.delete(&request.driver_id, date).await?;
    }

    let mut sessions = state.sessions.write();
    let entry = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound)?;
    entry.session.remove_driver(&request.driver_id);
    entry.controller.reset();
    Ok(Json(SelectionResponse {
        action: "unassigned",
        roster: view(id, entry),
    }))
}

/// POST /sessions/{id}/auto-assign - Run the previous-day-affinity pass.
///
/// The new pairings are staged in the session, not persisted.
async fn auto_assign<B: Backend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AutoAssignResponse>, ApiError> {
    let task = tokio::spawn(run_auto_assign(state, id));
    task.await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map(Json)
}

async fn run_auto_assign<B: Backend + 'static>(
    state: Arc<AppState<B>>,
    id: Uuid,
) -> Result<AutoAssignResponse, ApiError> {
    // Snapshot under the lock, then release it for the backend read.
    let (date, drivers, vehicles, existing) = {
        let mut sessions = state.sessions.write();
        let entry = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound)?;
        entry.session.begin_busy()?;
        (
            entry.session.date(),
            entry.session.drivers().to_vec(),
            entry.session.vehicles().to_vec(),
            entry.session.assignments(),
        )
    };

    let previous = state.store.previous_day_map(date).await;
    let (created, outcome) =
        autoassign::auto_assign(date, &drivers, &vehicles, &existing, &previous);

    let mut sessions = state.sessions.write();
    let entry = match sessions.get_mut(&id) {
        Some(entry) => entry,
        // Session was discarded mid-pass; nothing to release or stage.
        None => return Err(ApiError::SessionNotFound),
    };
    entry.session.stage_all(created.clone());
    entry.session.end_busy();

    if !matches!(outcome, AutoAssignOutcome::Assigned { .. }) {
        tracing::info!(%date, outcome = %outcome.message(), "auto-assign had nothing to do");
    }

    Ok(AutoAssignResponse {
        outcome: outcome.message(),
        created,
        roster: view(id, entry),
    })
}

/// POST /sessions/{id}/confirm - Persist pending pairings, in order.
///
/// Stops at the first failing upsert: persisted pairs move to the confirmed
/// phase, the failing pair and everything after it stay pending for retry.
async fn confirm<B: Backend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let task = tokio::spawn(run_confirm(state, id));
    task.await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map(Json)
}

async fn run_confirm<B: Backend + 'static>(
    state: Arc<AppState<B>>,
    id: Uuid,
) -> Result<ConfirmResponse, ApiError> {
    let pending = {
        let mut sessions = state.sessions.write();
        let entry = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound)?;
        entry.session.begin_busy()?;
        entry.session.pending().to_vec()
    };

    let mut persisted = 0usize;
    let mut failure: Option<ApiError> = None;
    for pair in pending {
        match state
            .store
            .upsert(&pair.driver_id, &pair.vehicle_id, pair.date)
            .await
        {
            Ok(assignment) => {
                if let Some(entry) = state.sessions.write().get_mut(&id) {
                    entry.session.mark_confirmed(assignment);
                }
                persisted += 1;
            }
            Err(error) => {
                failure = Some(error.into());
                break;
            }
        }
    }

    let mut sessions = state.sessions.write();
    let entry = sessions.get_mut(&id).ok_or(ApiError::SessionNotFound)?;
    entry.session.end_busy();

    match failure {
        Some(error) => Err(error),
        None => Ok(ConfirmResponse {
            persisted,
            roster: view(id, entry),
        }),
    }
}
