//! Queue errors.

use thiserror::Error;

/// Queue error types.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The underlying transport could not be reached. Callers back off and retry.
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    /// An entry could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An entry decoded but violates the record contract.
    #[error("Invalid queue entry: {0}")]
    InvalidEntry(String),
}

impl QueueError {
    /// Whether the failure is a connectivity problem worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, QueueError::Unavailable(_))
    }
}

impl From<tokio_rusqlite::Error> for QueueError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        QueueError::Unavailable(e.to_string())
    }
}
