//! Workspace events
//!
//! Every transition the tracker or the resource monitor observes becomes an
//! immutable [`Event`]. The payload is a sum type, so consumers match on the
//! kind exhaustively instead of inspecting a type tag.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::container::ContainerState;
use crate::domain::state::{MetricsDelta, WorkspaceMetrics, WorkspaceState};
use crate::domain::workspace::WorkspaceStatus;

mod bus;

pub use bus::{EventBus, EventHandler, SubscriptionId};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    StatusChange,
    ContainerUpdate,
    Error,
    Recovery,
    MetricsUpdate,
    SyncStarted,
    SyncCompleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::StatusChange => "status_change",
            EventType::ContainerUpdate => "container_update",
            EventType::Error => "error",
            EventType::Recovery => "recovery",
            EventType::MetricsUpdate => "metrics_update",
            EventType::SyncStarted => "sync_started",
            EventType::SyncCompleted => "sync_completed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed transition
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    /// Unique, time-derived identifier
    pub id: String,
    /// Empty for pass-level events
    pub workspace_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub data: EventData,
}

/// Event payload
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventData {
    StatusChange(StatusChangeEvent),
    ContainerUpdate(ContainerUpdateEvent),
    Error(ErrorEvent),
    Recovery(RecoveryEvent),
    MetricsUpdate(MetricsUpdateEvent),
    SyncStarted(SyncEvent),
    SyncCompleted(SyncEvent),
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChangeEvent {
    /// `None` on the first observation of a workspace
    pub old_status: Option<WorkspaceStatus>,
    pub new_status: WorkspaceStatus,
    pub reason: String,
    pub container_id: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerUpdateEvent {
    pub container_id: Option<String>,
    pub old_state: Option<ContainerState>,
    pub new_state: Option<ContainerState>,
    pub updated_at: DateTime<Utc>,
    pub metrics: Option<WorkspaceMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub error: String,
    pub code: ErrorCode,
    pub retry_count: u32,
    pub occurred_at: DateTime<Utc>,
    pub context: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecoveryEvent {
    pub resolved_error: String,
    pub recovery_method: String,
    pub recovered_at: DateTime<Utc>,
    pub downtime: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsUpdateEvent {
    pub old_metrics: Option<WorkspaceMetrics>,
    pub new_metrics: WorkspaceMetrics,
    pub updated_at: DateTime<Utc>,
    pub delta: Option<MetricsDelta>,
}

/// Used for both the start and the end of a pass
#[derive(Debug, Clone, Serialize)]
pub struct SyncEvent {
    pub workspace_count: usize,
    pub duration: Duration,
    pub success_count: usize,
    pub error_count: usize,
    pub timestamp: DateTime<Utc>,
}

/// Coarse classification of an error message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ConnectionError,
    TimeoutError,
    NotFoundError,
    PermissionError,
    ContainerError,
    NetworkError,
    UnknownError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConnectionError => "CONNECTION_ERROR",
            ErrorCode::TimeoutError => "TIMEOUT_ERROR",
            ErrorCode::NotFoundError => "NOT_FOUND_ERROR",
            ErrorCode::PermissionError => "PERMISSION_ERROR",
            ErrorCode::ContainerError => "CONTAINER_ERROR",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify an error message by case-sensitive substring; first match wins.
pub fn classify_error(message: &str) -> ErrorCode {
    const RULES: [(&str, ErrorCode); 6] = [
        ("connection", ErrorCode::ConnectionError),
        ("timeout", ErrorCode::TimeoutError),
        ("not found", ErrorCode::NotFoundError),
        ("permission", ErrorCode::PermissionError),
        ("container", ErrorCode::ContainerError),
        ("network", ErrorCode::NetworkError),
    ];

    RULES
        .iter()
        .find(|(needle, _)| message.contains(needle))
        .map(|(_, code)| *code)
        .unwrap_or(ErrorCode::UnknownError)
}

/// Reason attached to a status change
pub fn change_reason(old: Option<&WorkspaceState>, new: &WorkspaceState) -> String {
    let Some(old) = old else {
        return "workspace_initialized".to_string();
    };

    if old.status != new.status {
        format!("status_changed_{}_to_{}", old.status, new.status)
    } else if old.container_id != new.container_id {
        "container_changed".to_string()
    } else if old.container_state != new.container_state {
        format!(
            "container_state_changed_{}_to_{}",
            state_label(old.container_state),
            state_label(new.container_state)
        )
    } else {
        "no_change".to_string()
    }
}

fn state_label(state: Option<ContainerState>) -> &'static str {
    state.map(|s| s.as_str()).unwrap_or("none")
}

fn next_event_id(now: DateTime<Utc>) -> String {
    let seq = EVENT_SEQ.fetch_add(1, Ordering::Relaxed);
    format!(
        "evt_{}_{}",
        now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros()),
        seq
    )
}

impl Event {
    fn new(workspace_id: impl Into<String>, data: EventData) -> Self {
        let now = Utc::now();
        Self {
            id: next_event_id(now),
            workspace_id: workspace_id.into(),
            timestamp: now,
            data,
        }
    }

    /// Kind of this event
    pub fn event_type(&self) -> EventType {
        match &self.data {
            EventData::StatusChange(_) => EventType::StatusChange,
            EventData::ContainerUpdate(_) => EventType::ContainerUpdate,
            EventData::Error(_) => EventType::Error,
            EventData::Recovery(_) => EventType::Recovery,
            EventData::MetricsUpdate(_) => EventType::MetricsUpdate,
            EventData::SyncStarted(_) => EventType::SyncStarted,
            EventData::SyncCompleted(_) => EventType::SyncCompleted,
        }
    }

    pub fn status_change(old: Option<&WorkspaceState>, new: &WorkspaceState) -> Self {
        Self::new(
            new.workspace_id.clone(),
            EventData::StatusChange(StatusChangeEvent {
                old_status: old.map(|s| s.status),
                new_status: new.status,
                reason: change_reason(old, new),
                container_id: new.container_id.clone(),
                changed_at: new.last_updated,
            }),
        )
    }

    pub fn container_update(old: Option<&WorkspaceState>, new: &WorkspaceState) -> Self {
        Self::new(
            new.workspace_id.clone(),
            EventData::ContainerUpdate(ContainerUpdateEvent {
                container_id: new.container_id.clone(),
                old_state: old.and_then(|s| s.container_state),
                new_state: new.container_state,
                updated_at: new.last_updated,
                metrics: new.metrics.clone(),
            }),
        )
    }

    pub fn error(
        workspace_id: impl Into<String>,
        message: impl Into<String>,
        retry_count: u32,
        context: HashMap<String, String>,
    ) -> Self {
        let message = message.into();
        Self::new(
            workspace_id,
            EventData::Error(ErrorEvent {
                code: classify_error(&message),
                error: message,
                retry_count,
                occurred_at: Utc::now(),
                context,
            }),
        )
    }

    pub fn recovery(
        workspace_id: impl Into<String>,
        resolved_error: impl Into<String>,
        recovery_method: impl Into<String>,
        downtime: Duration,
    ) -> Self {
        Self::new(
            workspace_id,
            EventData::Recovery(RecoveryEvent {
                resolved_error: resolved_error.into(),
                recovery_method: recovery_method.into(),
                recovered_at: Utc::now(),
                downtime,
            }),
        )
    }

    pub fn metrics_update(
        workspace_id: impl Into<String>,
        old: Option<&WorkspaceMetrics>,
        new: &WorkspaceMetrics,
    ) -> Self {
        Self::new(
            workspace_id,
            EventData::MetricsUpdate(MetricsUpdateEvent {
                old_metrics: old.cloned(),
                new_metrics: new.clone(),
                updated_at: new.last_activity,
                delta: old.map(|o| new.delta(o)),
            }),
        )
    }

    pub fn sync_started(workspace_count: usize) -> Self {
        Self::new(
            "",
            EventData::SyncStarted(SyncEvent {
                workspace_count,
                duration: Duration::ZERO,
                success_count: 0,
                error_count: 0,
                timestamp: Utc::now(),
            }),
        )
    }

    pub fn sync_completed(
        workspace_count: usize,
        duration: Duration,
        success_count: usize,
        error_count: usize,
    ) -> Self {
        Self::new(
            "",
            EventData::SyncCompleted(SyncEvent {
                workspace_count,
                duration,
                success_count,
                error_count,
                timestamp: Utc::now(),
            }),
        )
    }
}
