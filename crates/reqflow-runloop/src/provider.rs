//! External data provider seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider error types.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Connection refused, reset or similar.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    /// No usable credentials.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The provider answered with something that could not be parsed.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transport(_) | ProviderError::Timeout)
    }
}

/// Reply to a submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    pub status: u16,
    pub body: String,
}

impl SubmitResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 and 201 count as accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self.status, 200 | 201)
    }
}

/// One ready response item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollItem {
    /// Download key of the item.
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Provider metadata as returned, including any `headers` object.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl PollItem {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content_type: None,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Reply to a poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PollResponse {
    pub status: u16,
    pub items: Vec<PollItem>,
    /// Error text from the provider, when it sent one.
    pub message: Option<String>,
}

impl PollResponse {
    pub fn ready(items: Vec<PollItem>) -> Self {
        Self {
            status: 200,
            items,
            message: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            items: Vec::new(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Submit, poll and download against the external provider.
///
/// Every call runs to completion or timeout; loops never preempt one.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Provider identifier for logs.
    fn id(&self) -> &str;

    /// Submit one request payload. Called once per attempt.
    async fn submit(&self, payload: &serde_json::Value) -> Result<SubmitResponse, ProviderError>;

    /// Ask whether responses for `identifier` are ready.
    async fn poll(&self, identifier: &str) -> Result<PollResponse, ProviderError>;

    /// Fetch the content of a ready item.
    async fn download(&self, key: &str) -> Result<String, ProviderError>;

    /// Re-resolve credentials after a 401.
    async fn refresh_auth(&self) -> Result<(), ProviderError>;

    /// Release the HTTP session.
    async fn close(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}
