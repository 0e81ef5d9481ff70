//! Per-workspace resource monitoring
//!
//! Each monitored workspace gets its own sampling task that pushes metrics
//! into a bounded [`MetricsReceiver`]. Samples are also kept in a short-lived
//! cache so consecutive samples can be compared.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::metrics_channel::{metrics_channel, MetricsSender, SendOutcome};
use super::stats_cache::{CacheStats, CachedStats, StatsCache};
use crate::domain::container::ContainerStats;
use crate::domain::state::{ResourceSummary, WorkspaceMetrics};
use crate::error::{Error, Result};
use crate::events::{Event, EventBus};
use crate::infra::ContainerRuntime;

pub use super::metrics_channel::{MetricsReceiver, MetricsSample};

/// Lower bound for the collection interval
pub const MIN_COLLECT_INTERVAL: Duration = Duration::from_millis(10);

/// Monitor settings
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub collect_interval: Duration,
    pub cache_ttl: Duration,
    pub cache_sweep_interval: Duration,
    pub cpu_warn_percent: f64,
    pub memory_warn_percent: f64,
    pub network_spike_mb: f64,
    /// Buffered samples per monitor before the oldest is dropped
    pub channel_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            collect_interval: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(30),
            cache_sweep_interval: Duration::from_secs(300),
            cpu_warn_percent: 80.0,
            memory_warn_percent: 85.0,
            network_spike_mb: 100.0,
            channel_capacity: 10,
        }
    }
}

/// Monitor introspection
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStats {
    pub active_monitors: usize,
    pub collect_interval_secs: u64,
    pub cache_entries: usize,
    pub running: bool,
}

struct ActiveMonitor {
    generation: u64,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Samples container resources for monitored workspaces
pub struct ResourceMonitor {
    inner: Arc<MonitorInner>,
    cancel: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    /// Tasks of replaced monitors, joined on stop
    retired: Mutex<Vec<JoinHandle<()>>>,
}

struct MonitorInner {
    runtime: Arc<dyn ContainerRuntime>,
    events: Arc<EventBus>,
    config: MonitorConfig,
    collect_interval_ms: AtomicU64,
    cache: StatsCache,
    monitors: DashMap<String, ActiveMonitor>,
    generation: AtomicU64,
}

impl ResourceMonitor {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        events: Arc<EventBus>,
        config: MonitorConfig,
    ) -> Self {
        let inner = MonitorInner {
            runtime,
            events,
            collect_interval_ms: AtomicU64::new(interval_ms(config.collect_interval)),
            cache: StatsCache::new(config.cache_ttl),
            monitors: DashMap::new(),
            generation: AtomicU64::new(0),
            config,
        };

        Self {
            inner: Arc::new(inner),
            cancel: CancellationToken::new(),
            sweeper: Mutex::new(None),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Start the background cache sweeper
    pub fn start(&self) {
        if self.cancel.is_cancelled() {
            warn!("Resource monitor was stopped and cannot be restarted");
            return;
        }

        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            warn!("Resource monitor already running");
            return;
        }

        let inner = self.inner.clone();
        let cancel = self.cancel.clone();
        *sweeper = Some(tokio::spawn(async move {
            let period = inner.config.cache_sweep_interval;
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = inner.cache.sweep();
                        if removed > 0 {
                            debug!("Swept {} expired stats cache entries", removed);
                        }
                    }
                }
            }
        }));

        info!("Resource monitor started");
    }

    /// Stop every monitor and the sweeper, waiting for their tasks
    pub async fn stop(&self) {
        self.cancel.cancel();

        let ids: Vec<String> = self
            .inner
            .monitors
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for id in ids {
            self.stop_monitoring(&id).await;
        }

        let retired: Vec<JoinHandle<()>> = self.retired.lock().drain(..).collect();
        for handle in retired {
            if let Err(e) = handle.await {
                warn!("Replaced monitor task ended abnormally: {}", e);
            }
        }

        let sweeper = self.sweeper.lock().take();
        if let Some(handle) = sweeper {
            let _ = handle.await;
        }

        info!("Resource monitor stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.sweeper.lock().is_some()
    }

    /// Applies to samples taken after the current one; clamped to
    /// [`MIN_COLLECT_INTERVAL`]
    pub fn set_collect_interval(&self, interval: Duration) {
        self.inner
            .collect_interval_ms
            .store(interval_ms(interval), Ordering::Relaxed);
    }

    pub fn collect_interval(&self) -> Duration {
        self.inner.collect_interval()
    }

    /// Begin sampling `workspace_id`, replacing any existing monitor for it.
    ///
    /// Sampling stops when `cancel` fires, when the monitor is stopped, or when
    /// the whole resource monitor shuts down; the receiver then yields `None`
    /// after draining.
    pub fn start_monitoring(
        &self,
        cancel: CancellationToken,
        workspace_id: &str,
    ) -> Result<MetricsReceiver> {
        if workspace_id.is_empty() {
            return Err(Error::InvalidParameter("workspace_id is required".into()));
        }
        if self.cancel.is_cancelled() {
            return Err(Error::MonitorStopped);
        }

        let (sender, receiver) = metrics_channel(workspace_id, self.inner.config.channel_capacity);
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let token = self.cancel.child_token();

        // The entry guard is held while spawning so the new task cannot
        // deregister itself before it is registered.
        let entry = self.inner.monitors.entry(workspace_id.to_string());
        let task = tokio::spawn(monitor_loop(
            self.inner.clone(),
            workspace_id.to_string(),
            generation,
            sender,
            token.clone(),
            cancel,
        ));
        let monitor = ActiveMonitor {
            generation,
            cancel: token,
            task,
        };
        let previous = match entry {
            Entry::Occupied(mut entry) => Some(entry.insert(monitor)),
            Entry::Vacant(entry) => {
                entry.insert(monitor);
                None
            }
        };

        if let Some(previous) = previous {
            previous.cancel.cancel();
            let mut retired = self.retired.lock();
            retired.retain(|handle| !handle.is_finished());
            retired.push(previous.task);
            debug!("Replaced existing monitor for workspace {}", workspace_id);
        }

        info!("Started monitoring workspace {}", workspace_id);
        Ok(receiver)
    }

    /// Stop sampling `workspace_id` and wait for its task to exit
    pub async fn stop_monitoring(&self, workspace_id: &str) {
        let Some((_, monitor)) = self.inner.monitors.remove(workspace_id) else {
            return;
        };

        monitor.cancel.cancel();
        if let Err(e) = monitor.task.await {
            warn!("Monitor task for workspace {} ended abnormally: {}", workspace_id, e);
        }
        info!("Stopped monitoring workspace {}", workspace_id);
    }

    /// Aggregate resource usage over every running container
    pub async fn get_resource_summary(&self) -> Result<ResourceSummary> {
        let stats = self.inner.runtime.collect_all_stats().await?;
        let system = self.inner.runtime.get_system_stats().await?;
        Ok(ResourceSummary::aggregate(stats.values(), system, Utc::now()))
    }

    /// IDs of currently monitored workspaces, sorted
    pub fn get_active_monitors(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .monitors
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    pub fn get_monitor_stats(&self) -> MonitorStats {
        MonitorStats {
            active_monitors: self.inner.monitors.len(),
            collect_interval_secs: self.inner.collect_interval().as_secs(),
            cache_entries: self.inner.cache.len(),
            running: self.is_running(),
        }
    }
}

async fn monitor_loop(
    inner: Arc<MonitorInner>,
    workspace_id: String,
    generation: u64,
    sender: MetricsSender,
    token: CancellationToken,
    caller: CancellationToken,
) {
    debug!("Monitor loop for workspace {} started", workspace_id);

    let mut delay = Duration::ZERO;
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = caller.cancelled() => break,
            _ = tokio::time::sleep(delay) => {
                let sample = tokio::select! {
                    _ = token.cancelled() => break,
                    _ = caller.cancelled() => break,
                    sample = inner.sample(&workspace_id) => sample,
                };

                if let Some(metrics) = sample {
                    if sender.send(Arc::new(metrics)) == SendOutcome::ReplacedOldest {
                        debug!(
                            "Metrics consumer for workspace {} is behind, dropped oldest sample",
                            workspace_id
                        );
                    }
                }
                delay = inner.collect_interval();
            }
        }
    }

    sender.close();
    inner
        .monitors
        .remove_if(&workspace_id, |_, monitor| monitor.generation == generation);
    debug!("Monitor loop for workspace {} exited", workspace_id);
}

fn interval_ms(interval: Duration) -> u64 {
    interval
        .max(MIN_COLLECT_INTERVAL)
        .as_millis()
        .min(u64::MAX as u128) as u64
}

impl MonitorInner {
    fn collect_interval(&self) -> Duration {
        Duration::from_millis(self.collect_interval_ms.load(Ordering::Relaxed))
    }

    /// Take one sample; `None` when there is nothing running to sample
    async fn sample(&self, workspace_id: &str) -> Option<WorkspaceMetrics> {
        let containers = match self.runtime.list_containers_for_workspace(workspace_id).await {
            Ok(containers) => containers,
            Err(e) => {
                warn!("Failed to list containers for workspace {}: {}", workspace_id, e);
                return None;
            }
        };

        let container = containers.into_iter().next()?;
        if !container.state.is_running() {
            return None;
        }

        let stats = match self.runtime.collect_stats(&container.id).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Failed to collect stats for container {}: {}", container.id, e);
                return None;
            }
        };

        let now = Utc::now();
        let previous = self.cache.get(&container.id);
        self.cache.insert(&container.id, stats.clone(), now);

        self.check_thresholds(workspace_id, &stats, previous.as_ref());

        let metrics = WorkspaceMetrics::from_stats(&stats, &container, now);
        if let Some(previous) = previous {
            let before = WorkspaceMetrics::from_stats(&previous.stats, &container, previous.sampled_at);
            self.events
                .publish(Event::metrics_update(workspace_id, Some(&before), &metrics));
        }

        Some(metrics)
    }

    fn check_thresholds(
        &self,
        workspace_id: &str,
        stats: &ContainerStats,
        previous: Option<&CachedStats>,
    ) {
        if stats.cpu_percent > self.config.cpu_warn_percent {
            warn!(
                workspace_id,
                "High CPU usage: {:.1}% (threshold {:.0}%)",
                stats.cpu_percent,
                self.config.cpu_warn_percent
            );
        }

        if let Some(memory_percent) = stats.memory_percent() {
            if memory_percent > self.config.memory_warn_percent {
                warn!(
                    workspace_id,
                    "High memory usage: {:.1}% (threshold {:.0}%)",
                    memory_percent,
                    self.config.memory_warn_percent
                );
            }
        }

        if let Some(previous) = previous {
            let rx = stats.network_rx_mb - previous.stats.network_rx_mb;
            let tx = stats.network_tx_mb - previous.stats.network_tx_mb;
            if rx > self.config.network_spike_mb || tx > self.config.network_spike_mb {
                debug!(
                    workspace_id,
                    "Network spike: rx +{:.1}MB, tx +{:.1}MB", rx, tx
                );
            }
        }
    }
}
