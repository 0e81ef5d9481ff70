//! Controller configuration

use std::time::Duration;

use serde::Deserialize;

use crate::service::monitor::MonitorConfig;
use crate::service::tracker::TrackerConfig;

/// Controller configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server host
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Database URL (SQLite)
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Docker socket path
    #[serde(default = "default_docker_socket")]
    pub docker_socket: String,

    /// Seconds between reconciliation passes
    #[serde(default = "default_sync_interval")]
    pub sync_interval: u64,

    /// Recorded retry budget per workspace (reported, not enforced)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Seconds between metric samples of a monitored workspace
    #[serde(default = "default_collect_interval")]
    pub collect_interval: u64,

    /// Seconds a cached stats sample stays valid
    #[serde(default = "default_stats_cache_ttl")]
    pub stats_cache_ttl: u64,

    /// Seconds between sweeps of expired stats cache entries
    #[serde(default = "default_cache_sweep_interval")]
    pub cache_sweep_interval: u64,

    /// CPU percentage above which a warning is logged
    #[serde(default = "default_cpu_warn_percent")]
    pub cpu_warn_percent: f64,

    /// Memory usage (percent of limit) above which a warning is logged
    #[serde(default = "default_memory_warn_percent")]
    pub memory_warn_percent: f64,

    /// Network delta (MB) between two samples that gets logged
    #[serde(default = "default_network_spike_mb")]
    pub network_spike_mb: f64,

    /// Log output format: "text" or "json"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_database_url() -> String {
    "sqlite:data/workspace.db?mode=rwc".to_string()
}

fn default_docker_socket() -> String {
    "/var/run/docker.sock".to_string()
}

fn default_sync_interval() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_collect_interval() -> u64 {
    10
}

fn default_stats_cache_ttl() -> u64 {
    30
}

fn default_cache_sweep_interval() -> u64 {
    300 // 5 minutes
}

fn default_cpu_warn_percent() -> f64 {
    80.0
}

fn default_memory_warn_percent() -> f64 {
    85.0
}

fn default_network_spike_mb() -> f64 {
    100.0
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Config::default();

        if let Ok(val) = std::env::var("WORKSPACE_HTTP_HOST") {
            config.http_host = val;
        }
        if let Ok(val) = std::env::var("WORKSPACE_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                config.http_port = port;
            }
        }
        if let Ok(val) = std::env::var("WORKSPACE_DATABASE_URL") {
            config.database_url = val;
        }
        if let Ok(val) = std::env::var("WORKSPACE_DOCKER_SOCKET") {
            config.docker_socket = val;
        }
        if let Ok(val) = std::env::var("WORKSPACE_SYNC_INTERVAL") {
            if let Ok(secs) = val.parse() {
                config.sync_interval = secs;
            }
        }
        if let Ok(val) = std::env::var("WORKSPACE_MAX_RETRIES") {
            if let Ok(retries) = val.parse() {
                config.max_retries = retries;
            }
        }
        if let Ok(val) = std::env::var("WORKSPACE_COLLECT_INTERVAL") {
            if let Ok(secs) = val.parse() {
                config.collect_interval = secs;
            }
        }
        if let Ok(val) = std::env::var("WORKSPACE_STATS_CACHE_TTL") {
            if let Ok(secs) = val.parse() {
                config.stats_cache_ttl = secs;
            }
        }
        if let Ok(val) = std::env::var("WORKSPACE_CACHE_SWEEP_INTERVAL") {
            if let Ok(secs) = val.parse() {
                config.cache_sweep_interval = secs;
            }
        }
        if let Ok(val) = std::env::var("WORKSPACE_CPU_WARN_PERCENT") {
            if let Ok(pct) = val.parse() {
                config.cpu_warn_percent = pct;
            }
        }
        if let Ok(val) = std::env::var("WORKSPACE_MEMORY_WARN_PERCENT") {
            if let Ok(pct) = val.parse() {
                config.memory_warn_percent = pct;
            }
        }
        if let Ok(val) = std::env::var("WORKSPACE_NETWORK_SPIKE_MB") {
            if let Ok(mb) = val.parse() {
                config.network_spike_mb = mb;
            }
        }
        if let Ok(val) = std::env::var("WORKSPACE_LOG_FORMAT") {
            config.log_format = val;
        }

        Ok(config)
    }

    /// Tracker settings derived from this configuration
    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            sync_interval: Duration::from_secs(self.sync_interval.max(1)),
            max_retries: self.max_retries,
        }
    }

    /// Resource monitor settings derived from this configuration
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            collect_interval: Duration::from_secs(self.collect_interval.max(1)),
            cache_ttl: Duration::from_secs(self.stats_cache_ttl),
            cache_sweep_interval: Duration::from_secs(self.cache_sweep_interval.max(1)),
            cpu_warn_percent: self.cpu_warn_percent,
            memory_warn_percent: self.memory_warn_percent,
            network_spike_mb: self.network_spike_mb,
            ..MonitorConfig::default()
        }
    }

    /// Whether logs should be emitted as JSON
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_host: default_http_host(),
            http_port: default_http_port(),
            database_url: default_database_url(),
            docker_socket: default_docker_socket(),
            sync_interval: default_sync_interval(),
            max_retries: default_max_retries(),
            collect_interval: default_collect_interval(),
            stats_cache_ttl: default_stats_cache_ttl(),
            cache_sweep_interval: default_cache_sweep_interval(),
            cpu_warn_percent: default_cpu_warn_percent(),
            memory_warn_percent: default_memory_warn_percent(),
            network_spike_mb: default_network_spike_mb(),
            log_format: default_log_format(),
        }
    }
}
