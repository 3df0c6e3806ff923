//! Error types and handling.

use thiserror::Error;

use crate::panels::PanelError;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Settings store could not be read or written
    #[error("Settings store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// A panel rejected its state
    #[error("Panel error: {0}")]
    Panel(#[from] PanelError),

    /// A connection test is already in flight
    #[error("A connection test is already running.")]
    AlreadyRunning,
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Create a store error with message
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a config error with message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
