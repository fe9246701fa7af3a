//! Error types for Waypoint

use thiserror::Error;

/// Top-level error type for Waypoint operations
#[derive(Error, Debug)]
pub enum WaypointError {
    /// HTTP request/response handling error
    #[error("HTTP error: {0}")]
    Http(String),

    /// MongoDB error
    #[error("Database error: {0}")]
    Database(String),

    /// Authentication or token error
    #[error("Auth error: {0}")]
    Auth(String),

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for WaypointError {
    fn from(e: std::io::Error) -> Self {
        WaypointError::Internal(format!("IO error: {e}"))
    }
}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, WaypointError>;
