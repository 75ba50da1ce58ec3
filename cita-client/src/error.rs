//! Client error types

use std::time::Duration;

use thiserror::Error;

/// How a failure should be handled by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected locally before any network call; show inline
    Validation,
    /// Session is gone; the user has to sign in again
    Auth,
    /// The server refused the operation; stay on the current step and let the user retry
    Business,
    /// Network, timeout or unparsable response
    Transport,
    /// Local misconfiguration or storage failure
    System,
}

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Request was cancelled before it completed
    #[error("Request cancelled")]
    Cancelled,

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Authentication required (HTTP 401 on an authenticated call)
    #[error("Authentication required")]
    Unauthorized,

    /// Login rejected the submitted credentials
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Conflicting state on the server, e.g. the slot was just taken
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other non-2xx response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The payment provider rejected the payment
    #[error("Payment rejected: {0}")]
    PaymentRejected(String),

    /// Another operation already holds the processing lock
    #[error("Another operation is in progress")]
    Busy,

    /// Operation not allowed in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Session store failure
    #[error("Session store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed date or time in a model
    #[error(transparent)]
    Model(#[from] shared::ModelError),
}

impl ClientError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::Busy | Self::InvalidState(_) | Self::Model(_) => {
                ErrorCategory::Validation
            }
            Self::Unauthorized | Self::InvalidCredentials(_) | Self::Forbidden(_) => {
                ErrorCategory::Auth
            }
            Self::NotFound(_) | Self::Conflict(_) | Self::PaymentRejected(_) => {
                ErrorCategory::Business
            }
            Self::Api { status, .. } if *status < 500 => ErrorCategory::Business,
            Self::Api { .. }
            | Self::Http(_)
            | Self::Timeout(_)
            | Self::Cancelled
            | Self::InvalidResponse(_)
            | Self::Serialization(_) => ErrorCategory::Transport,
            Self::Store(_) | Self::Config(_) | Self::Internal(_) => ErrorCategory::System,
        }
    }

    /// Whether re-invoking the same action may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Business | ErrorCategory::Transport
        ) && !matches!(self, Self::NotFound(_))
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
