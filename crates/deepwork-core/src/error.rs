//! Core error types for deepwork-core.
//!
//! Everything is scoped to one session's command: no variant here is fatal
//! to the process, and the engine stays usable after any of them.

use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionStatus;

/// Core error type for deepwork-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Command is not legal from the session's current status.
    #[error("Cannot {command} session: not allowed from '{from}'")]
    InvalidTransition {
        command: &'static str,
        from: SessionStatus,
    },

    /// Missing or malformed input
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Backend failure
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Another command for this session is still awaiting the repository.
    #[error("Session {session_id} already has a command in flight")]
    CommandInFlight { session_id: i64 },

    /// The controller was closed; no further commands are accepted.
    #[error("Session {session_id} controller is closed")]
    Closed { session_id: i64 },

    /// The controller was closed while the command was in flight and the
    /// repository result was discarded.
    #[error("Result for session {session_id} discarded: controller closed during the call")]
    Superseded { session_id: i64 },

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Local errors are reported synchronously and never touch the repository.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidTransition { .. } | CoreError::Validation(_)
        )
    }
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required string was empty or whitespace
    #[error("'{field}' must not be empty")]
    EmptyField { field: &'static str },

    /// Required number was zero
    #[error("'{field}' must be positive")]
    NotPositive { field: &'static str },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Overdue was requested before the scheduled duration ran out.
    #[error(
        "Session has not exceeded its scheduled duration ({elapsed_secs}s of {scheduled_secs}s)"
    )]
    NotOverSchedule { elapsed_secs: i64, scheduled_secs: i64 },

    /// A session record breaks a data-model invariant.
    #[error("Session {session_id} violates invariant: {message}")]
    Invariant { session_id: i64, message: String },
}

/// Failures of the persistence boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Resource does not exist
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Request did not complete in time
    #[error("Request timed out")]
    Timeout,

    /// Backend failed (5xx or unexpected status)
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Backend refused the request (its own validation or state checks)
    #[error("Request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Connection-level failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("Invalid response payload: {0}")]
    Decode(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Home/config directory could not be prepared
    #[error("Cannot prepare config directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),
}

impl From<reqwest::Error> for RepositoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RepositoryError::Timeout
        } else if err.is_decode() {
            RepositoryError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            RepositoryError::Server {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            RepositoryError::Transport(err.to_string())
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
