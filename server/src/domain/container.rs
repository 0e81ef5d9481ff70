//! Container runtime domain model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Observed container state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Exited,
    Dead,
}

impl ContainerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
        }
    }

    /// Map a Docker engine state string.
    ///
    /// A restarting container has exited and is not serving; a container being
    /// removed is gone for our purposes. Anything unrecognised is treated as dead.
    pub fn from_docker(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "exited" | "restarting" => ContainerState::Exited,
            _ => ContainerState::Dead,
        }
    }

    pub fn is_running(&self) -> bool {
        *self == ContainerState::Running
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A container backing a workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub state: ContainerState,
    pub created_at: Option<DateTime<Utc>>,
}

impl Container {
    pub fn new(id: impl Into<String>, state: ContainerState) -> Self {
        Self {
            id: id.into(),
            name: None,
            image: None,
            state,
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Container statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    /// Cumulative MB received since container start
    pub network_rx_mb: f64,
    /// Cumulative MB sent since container start
    pub network_tx_mb: f64,
}

impl ContainerStats {
    /// Memory usage as a percentage of the limit, if a limit is known
    pub fn memory_percent(&self) -> Option<f64> {
        if self.memory_limit == 0 {
            return None;
        }
        Some(self.memory_usage as f64 / self.memory_limit as f64 * 100.0)
    }
}

/// Engine-wide statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub containers_total: u64,
    pub containers_running: u64,
    pub containers_paused: u64,
    pub containers_stopped: u64,
    pub images: u64,
    pub cpus: u64,
    pub memory_total: u64,
    pub server_version: Option<String>,
}
