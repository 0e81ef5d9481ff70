//! Error types for the workspace controller

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the workspace controller
#[derive(Debug, Error)]
pub enum Error {
    // Workspace errors (2000-2999)
    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("Workspace state not tracked: {0}")]
    WorkspaceStateNotFound(String),

    #[error("Invalid workspace status: {0}")]
    InvalidWorkspaceStatus(String),

    // Container errors (3000-3999)
    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Container stats unavailable: {0}")]
    StatsUnavailable(String),

    // Controller lifecycle errors (4000-4999)
    #[error("Workspace tracker is not running")]
    TrackerNotRunning,

    #[error("Resource monitor is stopped")]
    MonitorStopped,

    // Infrastructure errors (6000-6999)
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Docker error: {0}")]
    DockerError(String),

    // General errors (1000-1999)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the error code
    pub fn code(&self) -> u32 {
        match self {
            // Workspace errors (2000-2999)
            Error::WorkspaceNotFound(_) => 2001,
            Error::WorkspaceStateNotFound(_) => 2002,
            Error::InvalidWorkspaceStatus(_) => 2003,

            // Container errors (3000-3999)
            Error::ContainerNotFound(_) => 3001,
            Error::StatsUnavailable(_) => 3002,

            // Controller lifecycle errors (4000-4999)
            Error::TrackerNotRunning => 4001,
            Error::MonitorStopped => 4002,

            // Infrastructure errors (6000-6999)
            Error::DatabaseError(_) => 6001,
            Error::DockerError(_) => 6002,

            // General errors (1000-1999)
            Error::InvalidRequest(_) => 1001,
            Error::InvalidParameter(_) => 1002,
            Error::Internal(_) => 1003,
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::WorkspaceNotFound(_)
            | Error::WorkspaceStateNotFound(_)
            | Error::ContainerNotFound(_) => StatusCode::NOT_FOUND,

            Error::InvalidRequest(_)
            | Error::InvalidParameter(_)
            | Error::InvalidWorkspaceStatus(_) => StatusCode::BAD_REQUEST,

            Error::TrackerNotRunning | Error::MonitorStopped | Error::StatsUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            Error::DockerError(_) => StatusCode::BAD_GATEWAY,

            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

// Implement From for common error types
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<bollard::errors::Error> for Error {
    fn from(err: bollard::errors::Error) -> Self {
        Error::DockerError(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(err.to_string())
    }
}
