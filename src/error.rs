//! Error types for the timer core and its persistent store

use thiserror::Error;

/// Errors surfaced by the timer reconciler.
#[derive(Error, Debug)]
pub enum TimerError {
    /// The persisted state ordinal does not name a known timer state.
    #[error("Invalid persisted timer state ordinal: {0}")]
    InvalidPersistedState(i64),

    /// The wake scheduler could not arrange a callback.
    #[error("Failed to schedule wake callback: {0}")]
    Scheduling(String),

    /// The persistent store failed to read or write.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by [`crate::store::PersistentStore`] implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to atomically replace the backing file
    #[error("Failed to persist store file: {0}")]
    Persist(String),

    #[error("Store lock poisoned: {0}")]
    Poisoned(String),
}

pub type Result<T, E = TimerError> = std::result::Result<T, E>;
