//! Workspace repository for database operations

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::domain::workspace::{
    CreateWorkspaceParams, UpdateWorkspaceParams, Workspace, WorkspaceStatus,
};
use crate::error::{Error, Result};
use crate::infra::WorkspaceDirectory;

/// Database row for workspace
#[derive(Debug, FromRow)]
struct WorkspaceRow {
    id: String,
    name: Option<String>,
    status: String,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<WorkspaceRow> for Workspace {
    type Error = Error;

    fn try_from(row: WorkspaceRow) -> Result<Self> {
        let status = WorkspaceStatus::from_str(&row.status)
            .ok_or_else(|| Error::InvalidWorkspaceStatus(row.status.clone()))?;

        let metadata: HashMap<String, String> = serde_json::from_str(&row.metadata)
            .map_err(|e| Error::Internal(format!("Failed to parse metadata: {}", e)))?;

        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
            .with_timezone(&Utc);

        let updated_at = DateTime::parse_from_rfc3339(&row.updated_at)
            .map_err(|e| Error::Internal(format!("Failed to parse updated_at: {}", e)))?
            .with_timezone(&Utc);

        Ok(Workspace {
            id: row.id,
            name: row.name,
            status,
            metadata,
            created_at,
            updated_at,
        })
    }
}

/// Workspace repository for database operations
pub struct WorkspaceRepository {
    pool: SqlitePool,
}

impl WorkspaceRepository {
    /// Create a new repository with the given pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new workspace
    pub async fn create(&self, params: CreateWorkspaceParams) -> Result<Workspace> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let status = params.status.unwrap_or(WorkspaceStatus::Inactive);
        let metadata = serde_json::to_string(&params.metadata.unwrap_or_default())
            .map_err(|e| Error::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO workspaces (id, name, status, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&params.name)
        .bind(status.as_str())
        .bind(&metadata)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get(&id).await
    }

    /// Get a workspace by ID
    pub async fn get(&self, id: &str) -> Result<Workspace> {
        let row: WorkspaceRow = sqlx::query_as(
            r#"
            SELECT id, name, status, metadata, created_at, updated_at
            FROM workspaces
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::WorkspaceNotFound(id.to_string()))?;

        row.try_into()
    }

    /// List all workspaces, oldest first
    pub async fn list(&self) -> Result<Vec<Workspace>> {
        let rows: Vec<WorkspaceRow> = sqlx::query_as(
            r#"
            SELECT id, name, status, metadata, created_at, updated_at
            FROM workspaces
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    /// Apply a partial update
    pub async fn update(&self, id: &str, params: UpdateWorkspaceParams) -> Result<Workspace> {
        if params.is_empty() {
            return self.get(id).await;
        }

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE workspaces
            SET name = COALESCE(?, name), status = COALESCE(?, status), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&params.name)
        .bind(params.status.map(|s| s.as_str()))
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::WorkspaceNotFound(id.to_string()));
        }

        self.get(id).await
    }

    /// Delete a workspace
    pub async fn delete(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM workspaces WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::WorkspaceNotFound(id.to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl WorkspaceDirectory for WorkspaceRepository {
    async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        self.list().await
    }

    async fn get_workspace(&self, id: &str) -> Result<Workspace> {
        self.get(id).await
    }

    async fn update_workspace(&self, id: &str, params: UpdateWorkspaceParams) -> Result<Workspace> {
        self.update(id, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::sqlite::test_pool;

    #[tokio::test]
    async fn test_create_and_get_workspace() {
        let repo = WorkspaceRepository::new(test_pool().await);

        let params = CreateWorkspaceParams {
            name: Some("test-workspace".to_string()),
            ..Default::default()
        };

        let workspace = repo
            .create(params)
            .await
            .expect("Failed to create workspace");
        assert_eq!(workspace.name, Some("test-workspace".to_string()));
        assert_eq!(workspace.status, WorkspaceStatus::Inactive);

        let fetched = repo
            .get(&workspace.id)
            .await
            .expect("Failed to get workspace");
        assert_eq!(fetched.id, workspace.id);
        assert_eq!(fetched.name, workspace.name);
    }

    #[tokio::test]
    async fn test_list_workspaces() {
        let repo = WorkspaceRepository::new(test_pool().await);

        repo.create(CreateWorkspaceParams {
            name: Some("workspace1".to_string()),
            ..Default::default()
        })
        .await
        .expect("Failed to create workspace 1");
        repo.create(CreateWorkspaceParams {
            name: Some("workspace2".to_string()),
            status: Some(WorkspaceStatus::Archived),
            ..Default::default()
        })
        .await
        .expect("Failed to create workspace 2");

        let all = repo
            .list_workspaces()
            .await
            .expect("Failed to list workspaces");
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|w| w.status == WorkspaceStatus::Archived));
    }

    #[tokio::test]
    async fn test_update_status() {
        let repo = WorkspaceRepository::new(test_pool().await);

        let workspace = repo
            .create(CreateWorkspaceParams {
                name: Some("test".to_string()),
                status: Some(WorkspaceStatus::Active),
                ..Default::default()
            })
            .await
            .expect("Failed to create workspace");

        let updated = repo
            .update_workspace(
                &workspace.id,
                UpdateWorkspaceParams::status(WorkspaceStatus::Inactive),
            )
            .await
            .expect("Failed to update status");
        assert_eq!(updated.status, WorkspaceStatus::Inactive);
        assert_eq!(updated.name, Some("test".to_string()));
        assert!(updated.updated_at >= workspace.updated_at);
    }

    #[tokio::test]
    async fn test_update_missing_workspace() {
        let repo = WorkspaceRepository::new(test_pool().await);

        let result = repo
            .update("missing", UpdateWorkspaceParams::status(WorkspaceStatus::Inactive))
            .await;
        assert!(matches!(result, Err(Error::WorkspaceNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_workspace() {
        let repo = WorkspaceRepository::new(test_pool().await);

        let workspace = repo
            .create(CreateWorkspaceParams::default())
            .await
            .expect("Failed to create workspace");

        repo.delete(&workspace.id)
            .await
            .expect("Failed to delete workspace");

        let result = repo.get_workspace(&workspace.id).await;
        assert!(matches!(result, Err(Error::WorkspaceNotFound(_))));
    }
}
