//! Workspace state HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::domain::state::WorkspaceState;
use crate::service::tracker::TrackerStats;
use crate::{AppState, Error, Result};

// ==================== Response Types ====================

/// List states response
#[derive(Debug, Serialize)]
pub struct ListStatesResponse {
    pub states: Vec<WorkspaceState>,
    pub total: usize,
}

/// Sync request acknowledgement
#[derive(Debug, Serialize)]
pub struct SyncAcceptedResponse {
    pub accepted: bool,
    pub workspace_id: Option<String>,
}

// ==================== Handlers ====================

/// List every tracked workspace state
pub async fn list_states(State(state): State<AppState>) -> Json<ListStatesResponse> {
    let mut states: Vec<WorkspaceState> =
        state.tracker.get_all_workspace_states().into_values().collect();
    states.sort_by(|a, b| a.workspace_id.cmp(&b.workspace_id));

    Json(ListStatesResponse {
        total: states.len(),
        states,
    })
}

/// Get the tracked state of one workspace
pub async fn get_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkspaceState>> {
    state
        .tracker
        .get_workspace_state(&id)
        .map(Json)
        .ok_or(Error::WorkspaceStateNotFound(id))
}

/// Request a reconciliation of every workspace
pub async fn sync_all(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SyncAcceptedResponse>)> {
    state.tracker.force_sync("")?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SyncAcceptedResponse {
            accepted: true,
            workspace_id: None,
        }),
    ))
}

/// Request a reconciliation of one workspace
pub async fn sync_workspace(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<SyncAcceptedResponse>)> {
    state.tracker.force_sync(&id)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SyncAcceptedResponse {
            accepted: true,
            workspace_id: Some(id),
        }),
    ))
}

/// Tracker introspection
pub async fn tracker_stats(State(state): State<AppState>) -> Json<TrackerStats> {
    Json(state.tracker.get_stats())
}
