//! Bounded, drop-oldest delivery of metric samples to one consumer
//!
//! The producer never blocks: when the buffer is full the oldest sample is
//! discarded to make room, so a slow consumer sees a recent subset.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::domain::state::WorkspaceMetrics;

/// Sample as delivered to consumers
pub type MetricsSample = Arc<WorkspaceMetrics>;

/// Result of a non-blocking send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    /// Buffer was full; the oldest sample was dropped
    ReplacedOldest,
    Closed,
}

struct Shared {
    queue: Mutex<VecDeque<MetricsSample>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
    dropped: AtomicU64,
}

/// Producing half; closes the channel when dropped
pub struct MetricsSender {
    shared: Arc<Shared>,
}

/// Consuming half
pub struct MetricsReceiver {
    workspace_id: String,
    shared: Arc<Shared>,
}

/// Create a channel buffering at most `capacity` samples
pub fn metrics_channel(workspace_id: impl Into<String>, capacity: usize) -> (MetricsSender, MetricsReceiver) {
    let capacity = capacity.max(1);
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::with_capacity(capacity)),
        capacity,
        notify: Notify::new(),
        closed: AtomicBool::new(false),
        dropped: AtomicU64::new(0),
    });

    (
        MetricsSender {
            shared: shared.clone(),
        },
        MetricsReceiver {
            workspace_id: workspace_id.into(),
            shared,
        },
    )
}

impl MetricsSender {
    /// Enqueue a sample without blocking
    pub fn send(&self, sample: MetricsSample) -> SendOutcome {
        if self.shared.closed.load(Ordering::Acquire) {
            return SendOutcome::Closed;
        }

        let outcome = {
            let mut queue = self.shared.queue.lock();
            let outcome = if queue.len() >= self.shared.capacity {
                queue.pop_front();
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                SendOutcome::ReplacedOldest
            } else {
                SendOutcome::Delivered
            };
            queue.push_back(sample);
            outcome
        };

        self.shared.notify.notify_one();
        outcome
    }

    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }
}

impl Drop for MetricsSender {
    fn drop(&mut self) {
        self.close();
    }
}

impl MetricsReceiver {
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Next sample; `None` once the channel is closed and drained
    pub async fn recv(&mut self) -> Option<MetricsSample> {
        loop {
            if let Some(sample) = self.try_recv() {
                return Some(sample);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                // A sample may have raced in before the close
                return self.try_recv();
            }
            self.shared.notify.notified().await;
        }
    }

    /// Next buffered sample, if any
    pub fn try_recv(&mut self) -> Option<MetricsSample> {
        self.shared.queue.lock().pop_front()
    }

    /// Buffered sample count
    pub fn len(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples discarded because the consumer fell behind
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }

    pub fn into_stream(self) -> impl Stream<Item = MetricsSample> + Send {
        futures::stream::unfold(self, |mut rx| async move {
            rx.recv().await.map(|sample| (sample, rx))
        })
    }
}
