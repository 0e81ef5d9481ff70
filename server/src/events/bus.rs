//! Event bus

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::{Event, EventData};
use crate::util::spawn_isolated;

/// Subscriber callback
pub type EventHandler = Arc<dyn Fn(Event) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Fire-and-forget pub/sub fan-out.
///
/// Every published event is logged, then handed to each subscriber on its own
/// task. Delivery is not confirmed, not ordered across subscribers, and not
/// retried; a panicking subscriber only loses its own copy.
pub struct EventBus {
    handlers: RwLock<Vec<(SubscriptionId, EventHandler)>>,
    next_id: AtomicU64,
    published: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
        }
    }

    /// Register a handler for all subsequent events
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, Arc::new(handler)));
        debug!("Event subscriber {:?} registered", id);
        id
    }

    /// Remove a handler; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(sid, _)| *sid != id);
        before != handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Number of events published so far
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Log the event and fan it out to every subscriber
    pub fn publish(&self, event: Event) {
        log_event(&event);
        self.published.fetch_add(1, Ordering::Relaxed);

        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in handlers {
            let event = event.clone();
            let label = format!("Event handler for {}", event.id);
            spawn_isolated(label, move || handler(event));
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Default sink: one log line per event
fn log_event(event: &Event) {
    let workspace_id = event.workspace_id.as_str();
    match &event.data {
        EventData::StatusChange(e) => info!(
            workspace_id,
            event_id = %event.id,
            "Workspace status {} -> {} ({})",
            e.old_status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()),
            e.new_status,
            e.reason
        ),
        EventData::ContainerUpdate(e) => info!(
            workspace_id,
            event_id = %event.id,
            "Container {} state {:?} -> {:?}",
            e.container_id.as_deref().unwrap_or("none"),
            e.old_state,
            e.new_state
        ),
        EventData::Error(e) => warn!(
            workspace_id,
            event_id = %event.id,
            code = %e.code,
            retry_count = e.retry_count,
            "Workspace error: {}",
            e.error
        ),
        EventData::Recovery(e) => info!(
            workspace_id,
            event_id = %event.id,
            "Workspace recovered from '{}' via {} after {:?}",
            e.resolved_error,
            e.recovery_method,
            e.downtime
        ),
        EventData::MetricsUpdate(e) => debug!(
            workspace_id,
            event_id = %event.id,
            cpu_percent = e.new_metrics.cpu_percent,
            memory_usage = e.new_metrics.memory_usage,
            "Workspace metrics updated"
        ),
        EventData::SyncStarted(e) => debug!(
            event_id = %event.id,
            "Sync started for {} workspace(s)",
            e.workspace_count
        ),
        EventData::SyncCompleted(e) => debug!(
            event_id = %event.id,
            "Sync completed: {} workspace(s), {} ok, {} failed in {:?}",
            e.workspace_count,
            e.success_count,
            e.error_count,
            e.duration
        ),
    }
}
