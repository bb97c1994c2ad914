//! Error types for the tracking engine

use thiserror::Error;

/// Result alias used by the engine's public operations
pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Error, Debug)]
pub enum TrackerError {
    /// The id is already being monitored or was already resolved
    #[error("Signal already tracked: {0}")]
    AlreadyTracked(String),

    /// Entry rejected before any task was started
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// `shutdown()` was called; no new signals are accepted
    #[error("Tracker is shutting down")]
    ShuttingDown,

    /// Durable storage failed; in-memory tracking keeps going
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrackerError {
    /// Caller can fix the request and retry
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            TrackerError::AlreadyTracked(_) | TrackerError::InvalidInput(_)
        )
    }
}
