//! Error types shared across queuescale crates.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Invalid or missing configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("failed to load config file {}: {reason}", path.display())]
    File { path: PathBuf, reason: String },
}

/// Result type alias for collaborator calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Failure talking to the broker, the worker inspector or the orchestrator.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("orchestrator error: {0}")]
    Orchestrator(String),
}
