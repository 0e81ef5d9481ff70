//! Workspace domain model

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workspace status
///
/// `Active` and `Inactive` are derived from the live container by the tracker.
/// `Archived` is only ever set through the workspace directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceStatus {
    /// The workspace container is running
    Active,
    /// No running container backs the workspace
    Inactive,
    /// The workspace was archived by its owner
    Archived,
}

impl WorkspaceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkspaceStatus::Active => "active",
            WorkspaceStatus::Inactive => "inactive",
            WorkspaceStatus::Archived => "archived",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(WorkspaceStatus::Active),
            "inactive" => Some(WorkspaceStatus::Inactive),
            "archived" => Some(WorkspaceStatus::Archived),
            _ => None,
        }
    }
}

impl fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkspaceStatus::Active => "Active",
            WorkspaceStatus::Inactive => "Inactive",
            WorkspaceStatus::Archived => "Archived",
        };
        f.write_str(name)
    }
}

/// Workspace entity
///
/// The durable record of a workspace as kept by the workspace directory. It is
/// the desired state the tracker reconciles against the container runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    /// Unique identifier
    pub id: String,

    /// Optional human-readable name
    pub name: Option<String>,

    /// Last status recorded in the directory
    pub status: WorkspaceStatus,

    /// Custom metadata
    pub metadata: HashMap<String, String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    /// Create a new, inactive workspace
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: None,
            status: WorkspaceStatus::Inactive,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the directory status
    pub fn with_status(mut self, status: WorkspaceStatus) -> Self {
        self.status = status;
        self
    }

    /// Display name, falling back to the identifier
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Parameters for creating a workspace
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateWorkspaceParams {
    /// Optional name
    pub name: Option<String>,

    /// Initial status (defaults to inactive)
    pub status: Option<WorkspaceStatus>,

    /// Custom metadata
    pub metadata: Option<HashMap<String, String>>,
}

/// Partial update of a workspace record
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UpdateWorkspaceParams {
    pub name: Option<String>,
    pub status: Option<WorkspaceStatus>,
}

impl UpdateWorkspaceParams {
    /// Patch that only changes the status
    pub fn status(status: WorkspaceStatus) -> Self {
        Self {
            name: None,
            status: Some(status),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.status.is_none()
    }
}
