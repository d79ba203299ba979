//! Store errors.

use thiserror::Error;

/// Lifecycle store error types.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be reached or is busy.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),
}

impl StoreError {
    /// Whether the failure is a connectivity problem worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(e: tokio_rusqlite::Error) -> Self {
        match e {
            tokio_rusqlite::Error::ConnectionClosed => {
                StoreError::Unavailable("connection closed".to_string())
            }
            tokio_rusqlite::Error::Rusqlite(err) => err.into(),
            other => StoreError::Query(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy)
            | Some(rusqlite::ErrorCode::DatabaseLocked)
            | Some(rusqlite::ErrorCode::CannotOpen) => StoreError::Unavailable(e.to_string()),
            _ => StoreError::Query(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_closed_is_transient() {
        let err = StoreError::from(tokio_rusqlite::Error::ConnectionClosed);
        assert!(err.is_transient());
    }

    #[test]
    fn test_query_error_not_transient() {
        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, StoreError::Query(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_invalid_status_display() {
        let err = StoreError::InvalidStatus("bogus".to_string());
        assert_eq!(err.to_string(), "Invalid status: bogus");
    }
}
