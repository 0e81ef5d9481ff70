//! Infrastructure layer
//!
//! The controller depends on two collaborators: a workspace directory holding
//! the desired state, and a container runtime reporting the actual state.
//! Both are traits so the tracker and monitor can run against fakes.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::container::{Container, ContainerStats, SystemStats};
use crate::domain::workspace::{UpdateWorkspaceParams, Workspace};
use crate::error::Result;

pub mod docker;
pub mod sqlite;
pub mod workspace_repository;

/// Durable source of workspace records
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkspaceDirectory: Send + Sync {
    /// List every workspace
    async fn list_workspaces(&self) -> Result<Vec<Workspace>>;

    /// Get a workspace by ID
    async fn get_workspace(&self, id: &str) -> Result<Workspace>;

    /// Apply a partial update and return the stored record
    async fn update_workspace(&self, id: &str, params: UpdateWorkspaceParams) -> Result<Workspace>;
}

/// Container lifecycle and statistics primitives
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Containers belonging to a workspace; the first one is authoritative
    async fn list_containers_for_workspace(&self, workspace_id: &str) -> Result<Vec<Container>>;

    /// One stats sample of a container
    async fn collect_stats(&self, container_id: &str) -> Result<ContainerStats>;

    /// Stats of every running workspace container, keyed by container ID
    async fn collect_all_stats(&self) -> Result<HashMap<String, ContainerStats>>;

    /// Engine-wide statistics
    async fn get_system_stats(&self) -> Result<SystemStats>;
}
