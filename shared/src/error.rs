//! Model-level errors

use thiserror::Error;

/// Errors raised while interpreting wire values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Time-of-day string is not `HH:MM` or `HH:MM:SS`
    #[error("Invalid time of day: {0}")]
    InvalidTime(String),

    /// Date string is not `YYYY-MM-DD`
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Timestamp string is neither naive ISO-8601 nor RFC 3339
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Result type for model operations
pub type ModelResult<T> = Result<T, ModelError>;
