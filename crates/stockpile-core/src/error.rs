//! Error types for stockpile-core

use thiserror::Error;

/// Result type alias using stockpile-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in stockpile-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Durable store could not be opened; offline queuing is unavailable
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A read/write/update against the durable store failed
    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    /// Network failure or timeout while delivering an action
    #[error("Sync transport error: {0}")]
    Transport(String),

    /// Non-2xx response from the sync endpoint
    #[error("Sync rejected with HTTP {status}")]
    Rejected {
        /// HTTP status code returned by the endpoint
        status: u16,
    },

    /// Queued action not found
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    /// Pending conflict not found
    #[error("Conflict not found: {0}")]
    ConflictNotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<libsql::Error> for Error {
    fn from(error: libsql::Error) -> Self {
        Self::StorageWrite(error.to_string())
    }
}

impl Error {
    /// Whether a delivery failure is worth another attempt.
    ///
    /// Transport failures and 5xx rejections may succeed later; a 4xx
    /// rejection means the payload will never be accepted as-is.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_retryable() {
        assert!(Error::Transport("connection reset".to_string()).is_retryable());
    }

    #[test]
    fn server_rejections_are_retryable_client_rejections_are_not() {
        assert!(Error::Rejected { status: 500 }.is_retryable());
        assert!(Error::Rejected { status: 503 }.is_retryable());
        assert!(!Error::Rejected { status: 400 }.is_retryable());
        assert!(!Error::Rejected { status: 422 }.is_retryable());
    }

    #[test]
    fn storage_errors_are_not_retryable_as_deliveries() {
        assert!(!Error::StorageWrite("disk full".to_string()).is_retryable());
    }
}
