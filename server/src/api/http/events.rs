//! Event stream WebSocket handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::events::{Event, EventBus};
use crate::AppState;

/// Events buffered per connection; newer events are dropped past this
const EVENT_BUFFER: usize = 256;

/// Stream every published event as JSON
pub async fn events_websocket(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| stream_events(socket, state.events))
}

async fn stream_events(socket: WebSocket, events: Arc<EventBus>) {
    let (tx, mut rx) = mpsc::channel::<Event>(EVENT_BUFFER);
    let subscription = events.subscribe(move |event| {
        if tx.try_send(event).is_err() {
            tracing::debug!("Event stream client is behind, dropping event");
        }
    });

    let (mut writer, mut reader) = socket.split();

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                let json = match serde_json::to_string(&event) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!("Failed to serialize event: {}", e);
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

    events.unsubscribe(subscription);
    tracing::debug!("Event stream closed");
}
