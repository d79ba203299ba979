//! Stored request and response rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reqflow_queue::{RequestRecord, RequestType};

use crate::status::RequestStatus;

/// A tracked request with its lifecycle bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRequest {
    pub record: RequestRecord,
    pub status: RequestStatus,
    /// Last persisted failure message.
    pub error_message: Option<String>,
    /// Number of poll attempts made so far.
    pub poll_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredRequest {
    /// A freshly tracked record in the `queued` status.
    pub fn new(record: RequestRecord) -> Self {
        let now = Utc::now();
        Self {
            record,
            status: RequestStatus::Queued,
            error_message: None,
            poll_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.record.request_id
    }

    /// Refresh the mutable record fields from a redelivered copy, keeping status.
    pub fn refresh(&mut self, record: &RequestRecord) {
        self.record.priority = record.priority;
        self.record.retry_count = record.retry_count;
        self.record.max_retries = record.max_retries;
        self.record.enqueued_at = record.enqueued_at;
        self.updated_at = Utc::now();
    }

    /// Whether the tracked record is a data request.
    pub fn is_data_request(&self) -> bool {
        self.record.request_type == RequestType::DataRequest
    }
}

/// How a handled response was persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Csv,
    Json,
    Raw,
    Error,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Csv => "csv",
            ResponseKind::Json => "json",
            ResponseKind::Raw => "raw",
            ResponseKind::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "csv" => Some(ResponseKind::Csv),
            "json" => Some(ResponseKind::Json),
            "raw" => Some(ResponseKind::Raw),
            "error" => Some(ResponseKind::Error),
            _ => None,
        }
    }
}

/// Content produced by a response handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub request_id: String,
    pub identifier: String,
    pub kind: ResponseKind,
    /// Provider-side key of the downloaded item, when there is one.
    pub key: Option<String>,
    pub content_type: String,
    pub content: String,
    pub received_at: DateTime<Utc>,
}

impl ResponseRecord {
    pub fn new(
        request_id: impl Into<String>,
        identifier: impl Into<String>,
        kind: ResponseKind,
        content_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            identifier: identifier.into(),
            kind,
            key: None,
            content_type: content_type.into(),
            content: content.into(),
            received_at: Utc::now(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}
