//! Docker container runtime

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::{
    container::{ListContainersOptions, Stats, StatsOptions},
    models::ContainerSummary,
    Docker,
};
use chrono::DateTime;
use futures::StreamExt;
use tracing::{debug, info};

use crate::domain::container::{Container, ContainerState, ContainerStats, SystemStats};
use crate::error::{Error, Result};
use crate::infra::ContainerRuntime;

/// Label key linking a container to its workspace
pub const WORKSPACE_LABEL_KEY: &str = "workspace.workspace.id";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Docker manager exposing the container runtime primitives
pub struct DockerManager {
    client: Docker,
}

impl DockerManager {
    /// Create a new Docker manager
    pub fn new(socket_path: Option<&str>) -> Result<Self> {
        let client = match socket_path {
            Some(path) => {
                Docker::connect_with_socket(path, 120, bollard::API_DEFAULT_VERSION)
                    .map_err(|e| Error::DockerError(e.to_string()))?
            }
            None => {
                Docker::connect_with_local_defaults()
                    .map_err(|e| Error::DockerError(e.to_string()))?
            }
        };

        Ok(Self { client })
    }

    /// Check if Docker daemon is accessible
    pub async fn ping(&self) -> Result<()> {
        self.client
            .ping()
            .await
            .map_err(|e| Error::DockerError(format!("Docker ping failed: {}", e)))?;
        info!("Docker daemon reachable");
        Ok(())
    }

    /// List containers matching a label filter
    async fn list_by_label(&self, label_filter: String, all: bool) -> Result<Vec<Container>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![label_filter]);

        let options = ListContainersOptions {
            all,
            filters,
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(options))
            .await
            .map_err(|e| Error::DockerError(e.to_string()))?;

        Ok(containers.into_iter().filter_map(to_container).collect())
    }
}

#[async_trait]
impl ContainerRuntime for DockerManager {
    async fn list_containers_for_workspace(&self, workspace_id: &str) -> Result<Vec<Container>> {
        let containers = self
            .list_by_label(format!("{}={}", WORKSPACE_LABEL_KEY, workspace_id), true)
            .await?;
        debug!(
            "Found {} container(s) for workspace {}",
            containers.len(),
            workspace_id
        );
        Ok(containers)
    }

    async fn collect_stats(&self, container_id: &str) -> Result<ContainerStats> {
        let options = StatsOptions {
            stream: false,
            one_shot: true,
        };

        let mut stream = self.client.stats(container_id, Some(options));

        if let Some(result) = stream.next().await {
            let stats: Stats = result.map_err(|e| Error::DockerError(e.to_string()))?;
            return Ok(convert_stats(&stats));
        }

        Err(Error::StatsUnavailable(container_id.to_string()))
    }

    async fn collect_all_stats(&self) -> Result<HashMap<String, ContainerStats>> {
        let running = self
            .list_by_label(WORKSPACE_LABEL_KEY.to_string(), false)
            .await?;

        let mut all = HashMap::with_capacity(running.len());
        for container in running.into_iter().filter(|c| c.state.is_running()) {
            let stats = self.collect_stats(&container.id).await?;
            all.insert(container.id, stats);
        }

        Ok(all)
    }

    async fn get_system_stats(&self) -> Result<SystemStats> {
        let info = self
            .client
            .info()
            .await
            .map_err(|e| Error::DockerError(format!("Failed to get system info: {}", e)))?;

        let count = |v: Option<i64>| v.unwrap_or(0).max(0) as u64;

        Ok(SystemStats {
            containers_total: count(info.containers),
            containers_running: count(info.containers_running),
            containers_paused: count(info.containers_paused),
            containers_stopped: count(info.containers_stopped),
            images: count(info.images),
            cpus: count(info.ncpu),
            memory_total: count(info.mem_total),
            server_version: info.server_version,
        })
    }
}

/// Convert an engine container summary; summaries without an ID are skipped
fn to_container(summary: ContainerSummary) -> Option<Container> {
    let id = summary.id?;
    let state = summary
        .state
        .as_deref()
        .map(ContainerState::from_docker)
        .unwrap_or(ContainerState::Dead);

    Some(Container {
        id,
        name: summary
            .names
            .and_then(|names| names.into_iter().next())
            .map(|n| n.trim_start_matches('/').to_string()),
        image: summary.image,
        state,
        created_at: summary
            .created
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
    })
}

/// Convert a raw stats sample
fn convert_stats(stats: &Stats) -> ContainerStats {
    let (rx_bytes, tx_bytes) = match &stats.networks {
        Some(networks) => networks
            .values()
            .fold((0u64, 0u64), |(rx, tx), net| (rx + net.rx_bytes, tx + net.tx_bytes)),
        None => (0, 0),
    };

    ContainerStats {
        cpu_percent: calculate_cpu_percent(stats),
        memory_usage: stats.memory_stats.usage.unwrap_or(0),
        memory_limit: stats.memory_stats.limit.unwrap_or(0),
        network_rx_mb: rx_bytes as f64 / BYTES_PER_MB,
        network_tx_mb: tx_bytes as f64 / BYTES_PER_MB,
    }
}

/// Calculate CPU percentage from stats
fn calculate_cpu_percent(stats: &Stats) -> f64 {
    let cpu_stats = &stats.cpu_stats;
    let precpu_stats = &stats.precpu_stats;

    let cpu_delta = cpu_stats.cpu_usage.total_usage as f64
        - precpu_stats.cpu_usage.total_usage as f64;

    let system_delta = cpu_stats.system_cpu_usage.unwrap_or(0) as f64
        - precpu_stats.system_cpu_usage.unwrap_or(0) as f64;

    if system_delta > 0.0 && cpu_delta > 0.0 {
        let num_cpus = cpu_stats.online_cpus.unwrap_or(1) as f64;
        (cpu_delta / system_delta) * num_cpus * 100.0
    } else {
        0.0
    }
}
