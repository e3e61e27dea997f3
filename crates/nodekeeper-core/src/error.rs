//! Error types for nodekeeper.
//!
//! Public supervisor, poller and probe operations absorb failures into state
//! and snapshot values; these errors travel between the internal helpers and
//! are converted into a `last_error` string or an "offline" snapshot at the
//! component boundary.

use crate::config::NetworkConfig;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the nodekeeper core.
#[derive(Debug, Error)]
pub enum NodeKeeperError {
    // Supervisor errors
    #[error("Failed to stage binary {path}: {message}")]
    Staging { path: PathBuf, message: String },

    #[error("Process error: {message}")]
    Process { message: String },

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Could not parse {what}: {message}")]
    Parse { what: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for nodekeeper operations.
pub type Result<T> = std::result::Result<T, NodeKeeperError>;

impl From<std::io::Error> for NodeKeeperError {
    fn from(err: std::io::Error) -> Self {
        NodeKeeperError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for NodeKeeperError {
    fn from(err: serde_json::Error) -> Self {
        NodeKeeperError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for NodeKeeperError {
    fn from(err: reqwest::Error) -> Self {
        // Every client in the crate is built with the same request timeout
        if err.is_timeout() {
            NodeKeeperError::Timeout(NetworkConfig::REQUEST_TIMEOUT)
        } else {
            NodeKeeperError::Network {
                message: err.to_string(),
                cause: Some(err.to_string()),
            }
        }
    }
}

impl NodeKeeperError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        NodeKeeperError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Check if this error is worth retrying on the next poll cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NodeKeeperError::Network { .. } | NodeKeeperError::Timeout(_)
        )
    }
}
