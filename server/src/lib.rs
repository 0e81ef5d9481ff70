//! Elevo workspace controller
//!
//! Keeps an in-memory view of every workspace consistent with the containers
//! actually running for it, samples container resources on demand, and
//! publishes lifecycle events for both.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod infra;
pub mod service;
mod util;

pub use config::Config;
pub use error::{Error, Result};

use events::EventBus;
use service::monitor::ResourceMonitor;
use service::tracker::WorkspaceTracker;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub tracker: Arc<WorkspaceTracker>,
    pub monitor: Arc<ResourceMonitor>,
    pub events: Arc<EventBus>,
}
