//! Tracked workspace state and resource metrics

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::container::{Container, ContainerState, ContainerStats, SystemStats};
use super::workspace::{Workspace, WorkspaceStatus};

/// Last-known state of a workspace, as derived by the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceState {
    pub workspace_id: String,

    /// Display name, informational only
    pub name: String,

    /// Derived status
    pub status: WorkspaceStatus,

    /// Most recently observed container
    pub container_id: Option<String>,
    pub container_state: Option<ContainerState>,

    pub last_updated: DateTime<Utc>,
    pub last_sync_attempt: DateTime<Utc>,

    /// Failed sync attempts; never reset automatically
    pub sync_attempts: u32,
    pub last_error: Option<String>,

    /// Attached only when a running container was found
    pub metrics: Option<WorkspaceMetrics>,
}

impl WorkspaceState {
    /// Derive the state of `workspace` from the authoritative container (the
    /// first one the runtime returned, if any).
    pub fn derive(
        workspace: &Workspace,
        container: Option<&Container>,
        metrics: Option<WorkspaceMetrics>,
        now: DateTime<Utc>,
    ) -> Self {
        let status = derive_status(workspace.status, container);
        let running = container.map(|c| c.state.is_running()).unwrap_or(false);

        Self {
            workspace_id: workspace.id.clone(),
            name: workspace.display_name().to_string(),
            status,
            container_id: container.map(|c| c.id.clone()),
            container_state: container.map(|c| c.state),
            last_updated: now,
            last_sync_attempt: now,
            sync_attempts: 0,
            last_error: None,
            metrics: if running { metrics } else { None },
        }
    }

    /// Whether `self` differs from `other` in a way that counts as a transition.
    /// Metrics never do.
    pub fn differs_from(&self, other: &WorkspaceState) -> bool {
        self.status != other.status
            || self.container_id != other.container_id
            || self.container_state != other.container_state
    }

    /// Whether the container id or state changed
    pub fn container_changed(&self, other: &WorkspaceState) -> bool {
        self.container_id != other.container_id || self.container_state != other.container_state
    }

    /// Record a failed sync attempt
    pub fn record_error(&mut self, message: impl Into<String>, at: DateTime<Utc>) {
        self.last_error = Some(message.into());
        self.sync_attempts += 1;
        self.last_sync_attempt = at;
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkspaceStatus::Active
    }
}

/// Status derivation rule.
///
/// Running container => Active. An archived workspace without any container
/// keeps its directory status. Everything else is Inactive.
pub fn derive_status(directory_status: WorkspaceStatus, container: Option<&Container>) -> WorkspaceStatus {
    match container {
        Some(c) if c.state.is_running() => WorkspaceStatus::Active,
        None if directory_status == WorkspaceStatus::Archived => WorkspaceStatus::Archived,
        _ => WorkspaceStatus::Inactive,
    }
}

/// Point-in-time resource metrics of a workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceMetrics {
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub network_rx_mb: f64,
    pub network_tx_mb: f64,
    /// Time since container creation, if known
    pub uptime: Option<String>,
    /// Time of this sample
    pub last_activity: DateTime<Utc>,
    // Reserved for error-rate tracking.
    pub error_count: u64,
    pub last_error_time: Option<DateTime<Utc>>,
}

impl WorkspaceMetrics {
    /// Build metrics from a stats sample of `container`
    pub fn from_stats(stats: &ContainerStats, container: &Container, now: DateTime<Utc>) -> Self {
        let uptime = container
            .created_at
            .map(|created| format_uptime(now.signed_duration_since(created)));

        Self {
            cpu_percent: stats.cpu_percent,
            memory_usage: stats.memory_usage,
            memory_limit: stats.memory_limit,
            network_rx_mb: stats.network_rx_mb,
            network_tx_mb: stats.network_tx_mb,
            uptime,
            last_activity: now,
            error_count: 0,
            last_error_time: None,
        }
    }

    /// Change from `previous` to `self`
    pub fn delta(&self, previous: &WorkspaceMetrics) -> MetricsDelta {
        MetricsDelta {
            cpu_percent: self.cpu_percent - previous.cpu_percent,
            memory_usage: self.memory_usage as i64 - previous.memory_usage as i64,
            network_rx_mb: self.network_rx_mb - previous.network_rx_mb,
            network_tx_mb: self.network_tx_mb - previous.network_tx_mb,
        }
    }

    /// Whether the resource readings differ (sample time is ignored)
    pub fn readings_differ(&self, other: &WorkspaceMetrics) -> bool {
        self.cpu_percent != other.cpu_percent
            || self.memory_usage != other.memory_usage
            || self.memory_limit != other.memory_limit
            || self.network_rx_mb != other.network_rx_mb
            || self.network_tx_mb != other.network_tx_mb
    }
}

/// Difference between two metric samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsDelta {
    pub cpu_percent: f64,
    pub memory_usage: i64,
    pub network_rx_mb: f64,
    pub network_tx_mb: f64,
}

/// Aggregate over all running containers, recomputed on demand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub total_containers: u64,
    pub active_containers: u64,
    pub total_cpu_percent: f64,
    pub total_memory_usage: u64,
    pub total_memory_limit: u64,
    pub total_network_rx_mb: f64,
    pub total_network_tx_mb: f64,
    pub system: SystemStats,
    pub generated_at: DateTime<Utc>,
}

impl ResourceSummary {
    /// Sum the per-container samples
    pub fn aggregate<'a>(
        stats: impl IntoIterator<Item = &'a ContainerStats>,
        system: SystemStats,
        now: DateTime<Utc>,
    ) -> Self {
        let mut summary = Self {
            total_containers: system.containers_total,
            active_containers: 0,
            total_cpu_percent: 0.0,
            total_memory_usage: 0,
            total_memory_limit: 0,
            total_network_rx_mb: 0.0,
            total_network_tx_mb: 0.0,
            system,
            generated_at: now,
        };

        for s in stats {
            summary.active_containers += 1;
            summary.total_cpu_percent += s.cpu_percent;
            summary.total_memory_usage += s.memory_usage;
            summary.total_memory_limit += s.memory_limit;
            summary.total_network_rx_mb += s.network_rx_mb;
            summary.total_network_tx_mb += s.network_tx_mb;
        }

        summary
    }
}

/// Render an uptime as `1h2m3s`, `2m3s` or `3s`
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.num_seconds().max(0);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace(status: WorkspaceStatus) -> Workspace {
        Workspace::new("ws-1").with_name("demo").with_status(status)
    }

    #[test]
    fn test_status_derivation_is_total() {
        let cases = [
            (Some(ContainerState::Running), WorkspaceStatus::Active),
            (Some(ContainerState::Paused), WorkspaceStatus::Inactive),
            (Some(ContainerState::Exited), WorkspaceStatus::Inactive),
            (Some(ContainerState::Dead), WorkspaceStatus::Inactive),
            (Some(ContainerState::Created), WorkspaceStatus::Inactive),
            (None, WorkspaceStatus::Inactive),
        ];

        for (state, expected) in cases {
            let container = state.map(|s| Container::new("c-1", s));
            for directory in [WorkspaceStatus::Active, WorkspaceStatus::Inactive] {
                assert_eq!(
                    derive_status(directory, container.as_ref()),
                    expected,
                    "container {:?} with directory status {:?}",
                    state,
                    directory
                );
            }
        }
    }

    #[test]
    fn test_archived_kept_without_container() {
        assert_eq!(
            derive_status(WorkspaceStatus::Archived, None),
            WorkspaceStatus::Archived
        );
        let running = Container::new("c-1", ContainerState::Running);
        assert_eq!(
            derive_status(WorkspaceStatus::Archived, Some(&running)),
            WorkspaceStatus::Active
        );
        let exited = Container::new("c-1", ContainerState::Exited);
        assert_eq!(
            derive_status(WorkspaceStatus::Archived, Some(&exited)),
            WorkspaceStatus::Inactive
        );
    }

    #[test]
    fn test_derive_drops_metrics_unless_running() {
        let now = Utc::now();
        let container = Container::new("c-1", ContainerState::Exited);
        let metrics = WorkspaceMetrics::from_stats(&ContainerStats::default(), &container, now);
        let state = WorkspaceState::derive(
            &workspace(WorkspaceStatus::Inactive),
            Some(&container),
            Some(metrics),
            now,
        );
        assert_eq!(state.status, WorkspaceStatus::Inactive);
        assert_eq!(state.container_id.as_deref(), Some("c-1"));
        assert_eq!(state.container_state, Some(ContainerState::Exited));
        assert!(state.metrics.is_none());
        assert_eq!(state.name, "demo");
    }

    #[test]
    fn test_change_detection_ignores_metrics() {
        let now = Utc::now();
        let container = Container::new("c-1", ContainerState::Running);
        let ws = workspace(WorkspaceStatus::Active);
        let a = WorkspaceState::derive(&ws, Some(&container), None, now);
        let stats = ContainerStats {
            cpu_percent: 12.0,
            ..Default::default()
        };
        let b = WorkspaceState::derive(
            &ws,
            Some(&container),
            Some(WorkspaceMetrics::from_stats(&stats, &container, now)),
            now,
        );
        assert!(!a.differs_from(&b));

        let stopped = Container::new("c-1", ContainerState::Exited);
        let c = WorkspaceState::derive(&ws, Some(&stopped), None, now);
        assert!(a.differs_from(&c));
        assert!(a.container_changed(&c));
    }

    #[test]
    fn test_record_error_increments_attempts() {
        let now = Utc::now();
        let mut state = WorkspaceState::derive(&workspace(WorkspaceStatus::Inactive), None, None, now);
        state.record_error("connection refused", now);
        state.record_error("connection refused", now);
        assert_eq!(state.sync_attempts, 2);
        assert_eq!(state.last_error.as_deref(), Some("connection refused"));
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::seconds(42)), "42s");
        assert_eq!(format_uptime(Duration::seconds(125)), "2m5s");
        assert_eq!(format_uptime(Duration::seconds(3600 + 120)), "1h2m0s");
        assert_eq!(format_uptime(Duration::seconds(-5)), "0s");
    }

    #[test]
    fn test_metrics_delta() {
        let now = Utc::now();
        let container = Container::new("c-1", ContainerState::Running);
        let old = WorkspaceMetrics::from_stats(
            &ContainerStats {
                cpu_percent: 10.0,
                memory_usage: 200,
                memory_limit: 1000,
                network_rx_mb: 1.0,
                network_tx_mb: 2.0,
            },
            &container,
            now,
        );
        let new = WorkspaceMetrics::from_stats(
            &ContainerStats {
                cpu_percent: 25.0,
                memory_usage: 150,
                memory_limit: 1000,
                network_rx_mb: 3.5,
                network_tx_mb: 2.0,
            },
            &container,
            now,
        );
        let delta = new.delta(&old);
        assert_eq!(delta.cpu_percent, 15.0);
        assert_eq!(delta.memory_usage, -50);
        assert_eq!(delta.network_rx_mb, 2.5);
        assert_eq!(delta.network_tx_mb, 0.0);
        assert!(new.readings_differ(&old));
    }

    #[test]
    fn test_resource_summary_aggregates() {
        let stats = vec![
            ContainerStats {
                cpu_percent: 10.0,
                memory_usage: 100,
                memory_limit: 1000,
                network_rx_mb: 1.0,
                network_tx_mb: 0.5,
            },
            ContainerStats {
                cpu_percent: 30.0,
                memory_usage: 300,
                memory_limit: 1000,
                network_rx_mb: 2.0,
                network_tx_mb: 1.5,
            },
        ];
        let system = SystemStats {
            containers_total: 5,
            containers_running: 2,
            ..Default::default()
        };
        let summary = ResourceSummary::aggregate(&stats, system, Utc::now());
        assert_eq!(summary.total_containers, 5);
        assert_eq!(summary.active_containers, 2);
        assert_eq!(summary.total_cpu_percent, 40.0);
        assert_eq!(summary.total_memory_usage, 400);
        assert_eq!(summary.total_memory_limit, 2000);
        assert_eq!(summary.total_network_rx_mb, 3.0);
        assert_eq!(summary.total_network_tx_mb, 2.0);
    }
}
