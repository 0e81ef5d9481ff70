//! Workspace state tracker
//!
//! Periodically reconciles the desired state held by the workspace directory
//! against the containers reported by the runtime. Derived state lives in an
//! in-memory store keyed by workspace ID. Only reconciliation passes write to
//! it, and passes are serialised, so the store has a single writer at any
//! time while reads are safe from anywhere.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::container::Container;
use crate::domain::state::{WorkspaceMetrics, WorkspaceState};
use crate::domain::workspace::{UpdateWorkspaceParams, Workspace, WorkspaceStatus};
use crate::error::{Error, Result};
use crate::events::{Event, EventBus};
use crate::infra::{ContainerRuntime, WorkspaceDirectory};
use crate::util::spawn_isolated;

/// Pending force-sync requests beyond this are coalesced
const SYNC_QUEUE_CAPACITY: usize = 16;

/// Lower bound for the sync interval
pub const MIN_SYNC_INTERVAL: Duration = Duration::from_millis(10);

/// Listener invoked on every state transition with
/// `(workspace_id, old_state, new_state)`; `old_state` is `None` on the first
/// observation of a workspace.
pub type StateChangeCallback =
    Arc<dyn Fn(&str, Option<&WorkspaceState>, &WorkspaceState) + Send + Sync>;

/// Tracker settings
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub sync_interval: Duration,
    /// Recorded only; failing workspaces keep being retried every pass
    pub max_retries: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Tracker introspection
#[derive(Debug, Clone, Serialize)]
pub struct TrackerStats {
    pub tracked_workspaces: usize,
    pub sync_interval_secs: u64,
    pub max_retries: u32,
    pub callbacks: usize,
    pub running: bool,
}

/// Outcome of one full reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub workspace_count: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub removed_count: usize,
    pub duration: Duration,
}

#[derive(Debug)]
enum SyncRequest {
    All,
    Workspace(String),
}

/// Reconciles workspace state against the container runtime
pub struct WorkspaceTracker {
    inner: Arc<TrackerInner>,
    cancel: CancellationToken,
    requests: mpsc::Sender<SyncRequest>,
    pending_requests: Mutex<Option<mpsc::Receiver<SyncRequest>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct TrackerInner {
    directory: Arc<dyn WorkspaceDirectory>,
    runtime: Arc<dyn ContainerRuntime>,
    events: Arc<EventBus>,
    states: DashMap<String, WorkspaceState>,
    callbacks: RwLock<Vec<StateChangeCallback>>,
    sync_interval_ms: AtomicU64,
    max_retries: AtomicU32,
    pass_lock: tokio::sync::Mutex<()>,
}

impl WorkspaceTracker {
    /// Create a new tracker; nothing runs until [`start`](Self::start)
    pub fn new(
        directory: Arc<dyn WorkspaceDirectory>,
        runtime: Arc<dyn ContainerRuntime>,
        events: Arc<EventBus>,
        config: TrackerConfig,
    ) -> Self {
        let (requests, pending) = mpsc::channel(SYNC_QUEUE_CAPACITY);

        let inner = TrackerInner {
            directory,
            runtime,
            events,
            states: DashMap::new(),
            callbacks: RwLock::new(Vec::new()),
            sync_interval_ms: AtomicU64::new(duration_ms(config.sync_interval)),
            max_retries: AtomicU32::new(config.max_retries),
            pass_lock: tokio::sync::Mutex::new(()),
        };

        Self {
            inner: Arc::new(inner),
            cancel: CancellationToken::new(),
            requests,
            pending_requests: Mutex::new(Some(pending)),
            task: Mutex::new(None),
        }
    }

    /// Start the background reconciliation loop. Returns immediately.
    pub fn start(&self) {
        if self.cancel.is_cancelled() {
            warn!("Workspace tracker was stopped and cannot be restarted");
            return;
        }

        let mut task = self.task.lock();
        if task.is_some() {
            warn!("Workspace tracker already running");
            return;
        }

        let Some(requests) = self.pending_requests.lock().take() else {
            return;
        };

        let inner = self.inner.clone();
        let cancel = self.cancel.clone();
        *task = Some(tokio::spawn(run_loop(inner, cancel, requests)));

        info!(
            "Workspace tracker started (sync interval {:?})",
            self.inner.sync_interval()
        );
    }

    /// Cancel the loop and wait for it to exit
    pub async fn stop(&self) {
        self.cancel.cancel();

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Workspace tracker loop ended abnormally: {}", e);
            }
        }

        info!("Workspace tracker stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.task.lock().is_some()
    }

    /// Takes effect after the next full pass; clamped to [`MIN_SYNC_INTERVAL`]
    pub fn set_sync_interval(&self, interval: Duration) {
        self.inner
            .sync_interval_ms
            .store(duration_ms(interval), Ordering::Relaxed);
    }

    pub fn sync_interval(&self) -> Duration {
        self.inner.sync_interval()
    }

    pub fn set_max_retries(&self, max_retries: u32) {
        self.inner.max_retries.store(max_retries, Ordering::Relaxed);
    }

    pub fn max_retries(&self) -> u32 {
        self.inner.max_retries.load(Ordering::Relaxed)
    }

    /// Request an out-of-band reconciliation; an empty ID resyncs everything.
    ///
    /// The work runs on the tracker loop; its outcome is only visible through
    /// state, events and logs.
    pub fn force_sync(&self, workspace_id: &str) -> Result<()> {
        if !self.is_running() {
            return Err(Error::TrackerNotRunning);
        }

        let request = if workspace_id.is_empty() {
            SyncRequest::All
        } else {
            SyncRequest::Workspace(workspace_id.to_string())
        };

        match self.requests.try_send(request) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(request)) => {
                debug!("Sync queue full, coalescing {:?}", request);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(Error::TrackerNotRunning),
        }
    }

    /// Snapshot of one workspace's state
    pub fn get_workspace_state(&self, workspace_id: &str) -> Option<WorkspaceState> {
        self.inner
            .states
            .get(workspace_id)
            .map(|state| state.value().clone())
    }

    /// Snapshot of every tracked workspace
    pub fn get_all_workspace_states(&self) -> HashMap<String, WorkspaceState> {
        self.inner
            .states
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Register a listener for state transitions
    pub fn on_state_change<F>(&self, callback: F)
    where
        F: Fn(&str, Option<&WorkspaceState>, &WorkspaceState) + Send + Sync + 'static,
    {
        self.inner.callbacks.write().push(Arc::new(callback));
    }

    pub fn get_stats(&self) -> TrackerStats {
        TrackerStats {
            tracked_workspaces: self.inner.states.len(),
            sync_interval_secs: self.inner.sync_interval().as_secs(),
            max_retries: self.max_retries(),
            callbacks: self.inner.callbacks.read().len(),
            running: self.is_running(),
        }
    }

    /// Run one full pass on the caller's task
    pub async fn sync_all(&self) -> Result<SyncReport> {
        self.inner.sync_all().await
    }

    /// Reconcile a single workspace on the caller's task
    pub async fn sync_workspace(&self, workspace_id: &str) {
        self.inner.sync_by_id(workspace_id).await
    }
}

async fn run_loop(
    inner: Arc<TrackerInner>,
    cancel: CancellationToken,
    mut requests: mpsc::Receiver<SyncRequest>,
) {
    let _ = inner.sync_all().await;

    // Only full passes push the deadline back; single-workspace requests never do.
    let next_pass = tokio::time::sleep(inner.sync_interval());
    tokio::pin!(next_pass);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = &mut next_pass => {
                let _ = inner.sync_all().await;
                next_pass
                    .as_mut()
                    .reset(tokio::time::Instant::now() + inner.sync_interval());
            }
            Some(request) = requests.recv() => match request {
                SyncRequest::All => {
                    let _ = inner.sync_all().await;
                    next_pass
                        .as_mut()
                        .reset(tokio::time::Instant::now() + inner.sync_interval());
                }
                SyncRequest::Workspace(id) => inner.sync_by_id(&id).await,
            },
        }
    }

    debug!("Workspace tracker loop exited");
}

impl TrackerInner {
    fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms.load(Ordering::Relaxed))
    }

    async fn sync_all(&self) -> Result<SyncReport> {
        let _pass = self.pass_lock.lock().await;
        let started = Instant::now();

        let workspaces = match self.directory.list_workspaces().await {
            Ok(workspaces) => workspaces,
            Err(e) => {
                error!("Failed to list workspaces, skipping sync pass: {}", e);
                self.events.publish(Event::error(
                    "",
                    e.to_string(),
                    0,
                    error_context("list_workspaces", None),
                ));
                return Err(e);
            }
        };

        self.events.publish(Event::sync_started(workspaces.len()));

        let mut success_count = 0;
        let mut error_count = 0;
        for workspace in &workspaces {
            match self.sync_workspace(workspace).await {
                Ok(()) => success_count += 1,
                Err(e) => {
                    error_count += 1;
                    self.record_failure(&workspace.id, &e, "list_containers");
                }
            }
        }

        let removed_count = self.remove_unlisted(&workspaces);

        let report = SyncReport {
            workspace_count: workspaces.len(),
            success_count,
            error_count,
            removed_count,
            duration: started.elapsed(),
        };

        self.events.publish(Event::sync_completed(
            report.workspace_count,
            report.duration,
            report.success_count,
            report.error_count,
        ));

        Ok(report)
    }

    async fn sync_by_id(&self, workspace_id: &str) {
        let _pass = self.pass_lock.lock().await;

        match self.directory.get_workspace(workspace_id).await {
            Ok(workspace) => {
                if let Err(e) = self.sync_workspace(&workspace).await {
                    self.record_failure(workspace_id, &e, "list_containers");
                }
            }
            Err(Error::WorkspaceNotFound(_)) => {
                if self.states.remove(workspace_id).is_some() {
                    info!("Workspace {} no longer in directory, state dropped", workspace_id);
                }
            }
            Err(e) => self.record_failure(workspace_id, &e, "get_workspace"),
        }
    }

    /// Reconcile one workspace. Callers hold the pass lock.
    async fn sync_workspace(&self, workspace: &Workspace) -> Result<()> {
        let containers = self
            .runtime
            .list_containers_for_workspace(&workspace.id)
            .await?;
        let container = containers.first();

        let now = Utc::now();
        let metrics = match container {
            Some(c) if c.state.is_running() => self.collect_metrics(c, now).await,
            _ => None,
        };

        let mut new_state = WorkspaceState::derive(workspace, container, metrics, now);
        let old_state = self
            .states
            .get(&workspace.id)
            .map(|state| state.value().clone());

        if let Some(old) = &old_state {
            new_state.sync_attempts = old.sync_attempts;
            if let Some(resolved) = &old.last_error {
                let downtime = (now - old.last_updated).to_std().unwrap_or_default();
                self.events.publish(Event::recovery(
                    &workspace.id,
                    resolved.clone(),
                    "resync",
                    downtime,
                ));
            }
        }

        match old_state {
            Some(old) if !new_state.differs_from(&old) => {
                new_state.last_updated = old.last_updated;
                let metrics_changed = match (&old.metrics, &new_state.metrics) {
                    (Some(before), Some(after)) => after.readings_differ(before),
                    (None, Some(_)) => true,
                    _ => false,
                };

                self.states.insert(workspace.id.clone(), new_state.clone());

                if metrics_changed {
                    if let Some(after) = &new_state.metrics {
                        self.events.publish(Event::metrics_update(
                            &workspace.id,
                            old.metrics.as_ref(),
                            after,
                        ));
                    }
                }
            }
            old => self.apply_change(workspace, old, new_state).await,
        }

        Ok(())
    }

    async fn apply_change(
        &self,
        workspace: &Workspace,
        old: Option<WorkspaceState>,
        new: WorkspaceState,
    ) {
        self.states.insert(workspace.id.clone(), new.clone());

        self.events
            .publish(Event::status_change(old.as_ref(), &new));

        let container_changed = match &old {
            Some(old) => new.container_changed(old),
            None => new.container_id.is_some(),
        };
        if container_changed {
            self.events
                .publish(Event::container_update(old.as_ref(), &new));
        }

        // Active is owned by the live container; only the inactive transition is persisted
        let write_back = new.status == WorkspaceStatus::Inactive;
        let retry_count = new.sync_attempts;

        self.notify(old, new);

        if write_back {
            if let Err(e) = self
                .directory
                .update_workspace(
                    &workspace.id,
                    UpdateWorkspaceParams::status(WorkspaceStatus::Inactive),
                )
                .await
            {
                warn!(
                    "Failed to persist inactive status for workspace {}: {}",
                    workspace.id, e
                );
                self.events.publish(Event::error(
                    &workspace.id,
                    e.to_string(),
                    retry_count,
                    error_context("update_workspace", Some(workspace)),
                ));
            }
        }
    }

    async fn collect_metrics(&self, container: &Container, now: chrono::DateTime<Utc>) -> Option<WorkspaceMetrics> {
        match self.runtime.collect_stats(&container.id).await {
            Ok(stats) => Some(WorkspaceMetrics::from_stats(&stats, container, now)),
            Err(e) => {
                warn!("Failed to collect stats for container {}: {}", container.id, e);
                None
            }
        }
    }

    /// Annotate a failed sync on the stored state, if any, and report it
    fn record_failure(&self, workspace_id: &str, err: &Error, operation: &str) {
        let message = err.to_string();
        let retry_count = match self.states.get_mut(workspace_id) {
            Some(mut state) => {
                state.record_error(message.clone(), Utc::now());
                state.sync_attempts
            }
            None => 0,
        };

        let max_retries = self.max_retries.load(Ordering::Relaxed);
        if retry_count == max_retries && max_retries > 0 {
            warn!(
                "Workspace {} reached {} failed sync attempts; retries continue",
                workspace_id, retry_count
            );
        }

        let mut context = error_context(operation, None);
        context.insert("workspace_id".to_string(), workspace_id.to_string());
        self.events
            .publish(Event::error(workspace_id, message, retry_count, context));
    }

    /// Drop states of workspaces missing from the listing
    fn remove_unlisted(&self, workspaces: &[Workspace]) -> usize {
        let listed: HashSet<&str> = workspaces.iter().map(|w| w.id.as_str()).collect();
        let stale: Vec<String> = self
            .states
            .iter()
            .filter(|entry| !listed.contains(entry.key().as_str()))
            .map(|entry| entry.key().clone())
            .collect();

        for id in &stale {
            self.states.remove(id);
            info!("Workspace {} no longer in directory, state dropped", id);
        }

        stale.len()
    }

    fn notify(&self, old: Option<WorkspaceState>, new: WorkspaceState) {
        let callbacks: Vec<StateChangeCallback> = self.callbacks.read().clone();

        for callback in callbacks {
            let old = old.clone();
            let new = new.clone();
            let label = format!("State change callback for {}", new.workspace_id);
            spawn_isolated(label, move || callback(&new.workspace_id, old.as_ref(), &new));
        }
    }
}

fn error_context(operation: &str, workspace: Option<&Workspace>) -> HashMap<String, String> {
    let mut context = HashMap::new();
    context.insert("operation".to_string(), operation.to_string());
    if let Some(workspace) = workspace {
        context.insert("workspace_name".to_string(), workspace.display_name().to_string());
    }
    context
}

fn duration_ms(d: Duration) -> u64 {
    d.max(MIN_SYNC_INTERVAL).as_millis().min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::container::{ContainerState, ContainerStats};
    use crate::infra::{MockContainerRuntime, MockWorkspaceDirectory};
    use mockall::predicate::eq;

    fn tracker(directory: MockWorkspaceDirectory, runtime: MockContainerRuntime) -> WorkspaceTracker {
        WorkspaceTracker::new(
            Arc::new(directory),
            Arc::new(runtime),
            Arc::new(EventBus::new()),
            TrackerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_running_container_yields_active_without_write_back() {
        let mut directory = MockWorkspaceDirectory::new();
        directory
            .expect_list_workspaces()
            .returning(|| Ok(vec![Workspace::new("ws-1")]));
        directory.expect_update_workspace().never();

        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_containers_for_workspace()
            .with(eq("ws-1"))
            .returning(|_| Ok(vec![Container::new("c-1", ContainerState::Running)]));
        runtime.expect_collect_stats().with(eq("c-1")).returning(|_| {
            Ok(ContainerStats {
                cpu_percent: 45.0,
                memory_usage: 512 * 1024 * 1024,
                memory_limit: 1024 * 1024 * 1024,
                ..Default::default()
            })
        });

        let tracker = tracker(directory, runtime);
        let report = tracker.sync_all().await.expect("sync");
        assert_eq!(report.success_count, 1);

        let state = tracker.get_workspace_state("ws-1").expect("state");
        assert_eq!(state.status, WorkspaceStatus::Active);
        assert_eq!(state.container_id.as_deref(), Some("c-1"));
        assert_eq!(state.metrics.map(|m| m.cpu_percent), Some(45.0));
    }

    #[tokio::test]
    async fn test_inactive_transition_is_written_back() {
        let mut directory = MockWorkspaceDirectory::new();
        directory
            .expect_list_workspaces()
            .returning(|| Ok(vec![Workspace::new("ws-1").with_status(WorkspaceStatus::Active)]));
        directory
            .expect_update_workspace()
            .withf(|id, params| {
                id == "ws-1" && params.status == Some(WorkspaceStatus::Inactive)
            })
            .times(1)
            .returning(|id, _| Ok(Workspace::new(id)));

        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_containers_for_workspace()
            .returning(|_| Ok(vec![Container::new("c-1", ContainerState::Exited)]));

        let tracker = tracker(directory, runtime);
        tracker.sync_all().await.expect("first pass");
        // Unchanged second pass must not write back again
        tracker.sync_all().await.expect("second pass");

        let state = tracker.get_workspace_state("ws-1").expect("state");
        assert_eq!(state.status, WorkspaceStatus::Inactive);
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_pass() {
        let mut directory = MockWorkspaceDirectory::new();
        directory
            .expect_list_workspaces()
            .returning(|| Err(Error::DatabaseError("connection reset".into())));

        let mut runtime = MockContainerRuntime::new();
        runtime.expect_list_containers_for_workspace().never();

        let tracker = tracker(directory, runtime);
        let result = tracker.sync_all().await;
        assert!(matches!(result, Err(Error::DatabaseError(_))));
        assert!(tracker.get_all_workspace_states().is_empty());
    }

    #[tokio::test]
    async fn test_archived_workspace_without_container_stays_archived() {
        let mut directory = MockWorkspaceDirectory::new();
        directory.expect_list_workspaces().returning(|| {
            Ok(vec![Workspace::new("ws-1").with_status(WorkspaceStatus::Archived)])
        });
        directory.expect_update_workspace().never();

        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_containers_for_workspace()
            .returning(|_| Ok(Vec::new()));

        let tracker = tracker(directory, runtime);
        tracker.sync_all().await.expect("sync");

        let state = tracker.get_workspace_state("ws-1").expect("state");
        assert_eq!(state.status, WorkspaceStatus::Archived);
    }

    #[tokio::test]
    async fn test_stats_failure_is_not_a_sync_error() {
        let mut directory = MockWorkspaceDirectory::new();
        directory
            .expect_list_workspaces()
            .returning(|| Ok(vec![Workspace::new("ws-1")]));

        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_containers_for_workspace()
            .returning(|_| Ok(vec![Container::new("c-1", ContainerState::Running)]));
        runtime
            .expect_collect_stats()
            .returning(|_| Err(Error::DockerError("stats timeout".into())));

        let tracker = tracker(directory, runtime);
        let report = tracker.sync_all().await.expect("sync");
        assert_eq!(report.error_count, 0);

        let state = tracker.get_workspace_state("ws-1").expect("state");
        assert_eq!(state.status, WorkspaceStatus::Active);
        assert!(state.metrics.is_none());
        assert_eq!(state.sync_attempts, 0);
    }

    #[tokio::test]
    async fn test_force_sync_requires_running_tracker() {
        let tracker = tracker(MockWorkspaceDirectory::new(), MockContainerRuntime::new());
        assert!(matches!(
            tracker.force_sync(""),
            Err(Error::TrackerNotRunning)
        ));
    }

    #[tokio::test]
    async fn test_setters_and_stats() {
        let tracker = tracker(MockWorkspaceDirectory::new(), MockContainerRuntime::new());
        tracker.set_sync_interval(Duration::from_secs(5));
        tracker.set_max_retries(7);
        tracker.on_state_change(|_, _, _| {});

        let stats = tracker.get_stats();
        assert_eq!(stats.sync_interval_secs, 5);
        assert_eq!(stats.max_retries, 7);
        assert_eq!(stats.callbacks, 1);
        assert_eq!(stats.tracked_workspaces, 0);
        assert!(!stats.running);
    }

    #[tokio::test]
    async fn test_zero_sync_interval_is_clamped() {
        let tracker = WorkspaceTracker::new(
            Arc::new(MockWorkspaceDirectory::new()),
            Arc::new(MockContainerRuntime::new()),
            Arc::new(EventBus::new()),
            TrackerConfig {
                sync_interval: Duration::ZERO,
                ..Default::default()
            },
        );
        assert_eq!(tracker.sync_interval(), MIN_SYNC_INTERVAL);

        tracker.set_sync_interval(Duration::from_secs(5));
        tracker.set_sync_interval(Duration::ZERO);
        assert_eq!(tracker.sync_interval(), MIN_SYNC_INTERVAL);
    }

    #[tokio::test]
    async fn test_deleted_workspace_sync_drops_state() {
        let mut directory = MockWorkspaceDirectory::new();
        directory
            .expect_list_workspaces()
            .returning(|| Ok(vec![Workspace::new("ws-1")]));
        directory
            .expect_get_workspace()
            .with(eq("ws-1"))
            .returning(|id| Err(Error::WorkspaceNotFound(id.to_string())));

        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_containers_for_workspace()
            .returning(|_| Ok(Vec::new()));

        let tracker = tracker(directory, runtime);
        tracker.sync_all().await.expect("sync");
        assert!(tracker.get_workspace_state("ws-1").is_some());

        tracker.sync_workspace("ws-1").await;
        assert!(tracker.get_workspace_state("ws-1").is_none());
    }

    #[tokio::test]
    async fn test_directory_lookup_failure_counts_attempt() {
        let mut directory = MockWorkspaceDirectory::new();
        directory
            .expect_list_workspaces()
            .returning(|| Ok(vec![Workspace::new("ws-1")]));
        directory
            .expect_get_workspace()
            .returning(|_| Err(Error::DatabaseError("database is locked".into())));

        let mut runtime = MockContainerRuntime::new();
        runtime
            .expect_list_containers_for_workspace()
            .returning(|_| Ok(Vec::new()));

        let tracker = tracker(directory, runtime);
        tracker.sync_all().await.expect("sync");
        tracker.sync_workspace("ws-1").await;

        let state = tracker.get_workspace_state("ws-1").expect("state kept");
        assert_eq!(state.sync_attempts, 1);
        assert!(state.last_error.is_some());
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let mut directory = MockWorkspaceDirectory::new();
        directory.expect_list_workspaces().returning(|| Ok(Vec::new()));

        let tracker = tracker(directory, MockContainerRuntime::new());
        tracker.start();
        assert!(tracker.is_running());
        assert!(tracker.force_sync("").is_ok());

        tracker.stop().await;
        assert!(!tracker.is_running());
        assert!(matches!(
            tracker.force_sync("ws-1"),
            Err(Error::TrackerNotRunning)
        ));

        // Restart after stop is a no-op
        tracker.start();
        assert!(!tracker.is_running());
    }
}
