//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub tracker_running: bool,
    pub monitor_running: bool,
}

/// Liveness plus the state of the background loops
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let tracker_running = state.tracker.is_running();
    let monitor_running = state.monitor.is_running();

    Json(HealthResponse {
        status: if tracker_running && monitor_running {
            "ok"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
        tracker_running,
        monitor_running,
    })
}
