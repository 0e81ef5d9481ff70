//! Service layer

pub mod metrics_channel;
pub mod monitor;
pub mod stats_cache;
pub mod tracker;

pub use monitor::{MonitorConfig, ResourceMonitor};
pub use tracker::{TrackerConfig, WorkspaceTracker};
