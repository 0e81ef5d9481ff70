//! In-memory collaborators for controller tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use workspace_controller::domain::container::{
    Container, ContainerState, ContainerStats, SystemStats,
};
use workspace_controller::domain::state::WorkspaceState;
use workspace_controller::domain::workspace::{UpdateWorkspaceParams, Workspace};
use workspace_controller::events::{Event, EventBus, EventType};
use workspace_controller::infra::{ContainerRuntime, WorkspaceDirectory};
use workspace_controller::service::tracker::{TrackerConfig, WorkspaceTracker};
use workspace_controller::{Error, Result};

/// Workspace directory backed by a vector
#[derive(Default)]
pub struct FakeDirectory {
    workspaces: Mutex<Vec<Workspace>>,
    updates: Mutex<Vec<(String, UpdateWorkspaceParams)>>,
    fail_list: Mutex<bool>,
}

impl FakeDirectory {
    pub fn with(workspaces: Vec<Workspace>) -> Arc<Self> {
        let directory = Self::default();
        *directory.workspaces.lock() = workspaces;
        Arc::new(directory)
    }

    pub fn remove(&self, id: &str) {
        self.workspaces.lock().retain(|w| w.id != id);
    }

    pub fn set_fail_list(&self, fail: bool) {
        *self.fail_list.lock() = fail;
    }

    pub fn updates(&self) -> Vec<(String, UpdateWorkspaceParams)> {
        self.updates.lock().clone()
    }
}

#[async_trait]
impl WorkspaceDirectory for FakeDirectory {
    async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        if *self.fail_list.lock() {
            return Err(Error::DatabaseError("connection refused".into()));
        }
        Ok(self.workspaces.lock().clone())
    }

    async fn get_workspace(&self, id: &str) -> Result<Workspace> {
        self.workspaces
            .lock()
            .iter()
            .find(|w| w.id == id)
            .cloned()
            .ok_or_else(|| Error::WorkspaceNotFound(id.to_string()))
    }

    async fn update_workspace(&self, id: &str, params: UpdateWorkspaceParams) -> Result<Workspace> {
        self.updates.lock().push((id.to_string(), params.clone()));

        let mut workspaces = self.workspaces.lock();
        let workspace = workspaces
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| Error::WorkspaceNotFound(id.to_string()))?;
        if let Some(status) = params.status {
            workspace.status = status;
        }
        if let Some(name) = params.name {
            workspace.name = Some(name);
        }
        Ok(workspace.clone())
    }
}

/// Container runtime with scripted containers and stats
#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<HashMap<String, Vec<Container>>>,
    stats: Mutex<HashMap<String, ContainerStats>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace the containers of a workspace
    pub fn set_containers(&self, workspace_id: &str, containers: Vec<Container>) {
        self.containers
            .lock()
            .insert(workspace_id.to_string(), containers);
    }

    /// Single container with the given state
    pub fn set_container(&self, workspace_id: &str, container_id: &str, state: ContainerState) {
        self.set_containers(workspace_id, vec![Container::new(container_id, state)]);
    }

    pub fn set_stats(&self, container_id: &str, stats: ContainerStats) {
        self.stats.lock().insert(container_id.to_string(), stats);
    }

    /// Make container listing fail for a workspace
    pub fn fail_workspace(&self, workspace_id: &str, fail: bool) {
        let mut failing = self.failing.lock();
        if fail {
            failing.insert(workspace_id.to_string());
        } else {
            failing.remove(workspace_id);
        }
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_containers_for_workspace(&self, workspace_id: &str) -> Result<Vec<Container>> {
        if self.failing.lock().contains(workspace_id) {
            return Err(Error::DockerError("connection refused".into()));
        }
        Ok(self
            .containers
            .lock()
            .get(workspace_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn collect_stats(&self, container_id: &str) -> Result<ContainerStats> {
        self.stats
            .lock()
            .get(container_id)
            .cloned()
            .ok_or_else(|| Error::StatsUnavailable(container_id.to_string()))
    }

    async fn collect_all_stats(&self) -> Result<HashMap<String, ContainerStats>> {
        let containers = self.containers.lock();
        let stats = self.stats.lock();
        Ok(containers
            .values()
            .flatten()
            .filter(|c| c.state.is_running())
            .filter_map(|c| stats.get(&c.id).map(|s| (c.id.clone(), s.clone())))
            .collect())
    }

    async fn get_system_stats(&self) -> Result<SystemStats> {
        let containers = self.containers.lock();
        let all: Vec<&Container> = containers.values().flatten().collect();
        let running = all.iter().filter(|c| c.state.is_running()).count() as u64;
        Ok(SystemStats {
            containers_total: all.len() as u64,
            containers_running: running,
            containers_stopped: all.len() as u64 - running,
            ..Default::default()
        })
    }
}

/// One observed state transition
pub type Transition = (String, Option<WorkspaceState>, WorkspaceState);

pub fn tracker(
    directory: Arc<FakeDirectory>,
    runtime: Arc<FakeRuntime>,
    events: Arc<EventBus>,
) -> WorkspaceTracker {
    WorkspaceTracker::new(directory, runtime, events, TrackerConfig::default())
}

/// Register a callback forwarding transitions into a channel
pub fn watch_transitions(tracker: &WorkspaceTracker) -> mpsc::UnboundedReceiver<Transition> {
    let (tx, rx) = mpsc::unbounded_channel();
    tracker.on_state_change(move |id, old, new| {
        let _ = tx.send((id.to_string(), old.cloned(), new.clone()));
    });
    rx
}

/// Subscribe to the bus, forwarding events into a channel
pub fn watch_events(events: &EventBus) -> mpsc::UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    events.subscribe(move |event| {
        let _ = tx.send(event);
    });
    rx
}

/// Everything delivered within `wait`
pub async fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>, wait: Duration) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(Some(item)) = tokio::time::timeout(wait, rx.recv()).await {
        items.push(item);
    }
    items
}

pub fn count(events: &[Event], kind: EventType) -> usize {
    events.iter().filter(|e| e.event_type() == kind).count()
}

pub const SETTLE: Duration = Duration::from_millis(100);
