//! Error types for the submitter and poller loops.

use thiserror::Error;

use reqflow_queue::QueueError;
use reqflow_store::StoreError;

use crate::provider::ProviderError;

/// Errors that can occur while running a loop.
#[derive(Debug, Error)]
pub enum RunLoopError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Non-2xx reply to a submission.
    #[error("Provider rejected request with status {status}: {body}")]
    ProviderRejected { status: u16, body: String },

    /// 404 on poll.
    #[error("Request not found: {0}")]
    NotFound(String),

    /// 401 from the provider.
    #[error("Authorization expired")]
    AuthExpired,

    /// A registered response handler failed.
    #[error("Handler {name} failed: {message}")]
    HandlerFault { name: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RunLoopError {
    /// Connectivity failures are backed off and retried, never escalated.
    pub fn is_transient(&self) -> bool {
        match self {
            RunLoopError::Queue(e) => e.is_transient(),
            RunLoopError::Store(e) => e.is_transient(),
            RunLoopError::Provider(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type for loop operations.
pub type RunLoopResult<T> = Result<T, RunLoopError>;
