//! Error types for the recorder and its callers
//!
//! Storage failures inside a flush never surface here: the flush engine
//! logs them and keeps the events buffered. Only query paths and
//! argument validation return these errors.

use thiserror::Error;

use crate::storage::StoreError;

/// Result type for recorder operations
pub type Result<T> = std::result::Result<T, RecorderError>;

#[derive(Debug, Error)]
pub enum RecorderError {
    /// Unknown stats period (valid: hour, day, week, month)
    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    /// Callback payload is not `level_N` with N in 1..=10
    #[error("invalid level: {0}")]
    InvalidLevel(String),

    /// The recorder has been shut down; the event was not accepted
    #[error("recorder is shut down")]
    Closed,

    #[error(transparent)]
    Storage(#[from] StoreError),
}
