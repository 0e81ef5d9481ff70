//! HTTP API handlers

mod events;
mod health;
mod resources;
mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Workspace state routes
        .route("/workspaces/states", get(state::list_states))
        .route("/workspaces/sync", post(state::sync_all))
        .route("/workspaces/{id}/state", get(state::get_state))
        .route("/workspaces/{id}/sync", post(state::sync_workspace))
        .route("/tracker/stats", get(state::tracker_stats))
        // Resource routes
        .route("/resources/summary", get(resources::resource_summary))
        .route("/monitor/stats", get(resources::monitor_stats))
        .route("/workspaces/{id}/metrics", get(resources::metrics_websocket))
        // Event stream
        .route("/events", get(events::events_websocket));

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
