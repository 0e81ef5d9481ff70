//! Resource monitoring HTTP and WebSocket handlers

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
    Json,
};
use futures::{SinkExt, StreamExt};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::domain::state::ResourceSummary;
use crate::service::monitor::{MetricsReceiver, MonitorStats};
use crate::{AppState, Result};

/// Aggregate usage over all running workspace containers
pub async fn resource_summary(State(state): State<AppState>) -> Result<Json<ResourceSummary>> {
    let summary = state.monitor.get_resource_summary().await?;
    Ok(Json(summary))
}

/// Monitor introspection
pub async fn monitor_stats(State(state): State<AppState>) -> Json<MonitorStats> {
    Json(state.monitor.get_monitor_stats())
}

/// Stream live metrics of one workspace.
///
/// Monitoring lasts as long as the connection. A newer connection for the
/// same workspace takes over its monitor and closes this stream.
pub async fn metrics_websocket(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let cancel = CancellationToken::new();
    let receiver = state.monitor.start_monitoring(cancel.clone(), &id)?;
    let guard = cancel.drop_guard();

    Ok(ws.on_upgrade(move |socket| stream_metrics(socket, receiver, guard)))
}

async fn stream_metrics(socket: WebSocket, mut receiver: MetricsReceiver, _guard: DropGuard) {
    let (mut writer, mut reader) = socket.split();

    loop {
        tokio::select! {
            sample = receiver.recv() => {
                let Some(sample) = sample else { break };
                let json = match serde_json::to_string(sample.as_ref()) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to serialize metrics: {}", e);
                        continue;
                    }
                };
                if writer.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            msg = reader.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!(
        "Metrics stream for workspace {} closed",
        receiver.workspace_id()
    );
}
