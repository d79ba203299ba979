//! Request record definition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::command::ControlCommand;
use crate::error::QueueError;

/// Priority of urgent control commands such as EXIT.
pub const HIGH_CMD_PRIORITY: i64 = 2;
pub const HIGH_REQUEST_PRIORITY: i64 = 3;
pub const DEFAULT_REQUEST_PRIORITY: i64 = 4;
pub const DEFAULT_CMD_PRIORITY: i64 = 4;
pub const LOWEST_REQUEST_PRIORITY: i64 = 9;
/// Commands sent with this priority run after all queued work.
pub const LAST_CMD_PRIORITY: i64 = 10;

const DEFAULT_MAX_RETRIES: u32 = 3;
const IDENTIFIER_ID_PREFIX: usize = 6;

/// Kind of unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    /// Submitted to the provider.
    DataRequest,
    /// Steers the consuming loop.
    Command,
}

/// The unit of work and its metadata, as carried on the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// UUID for data requests, the command token for commands.
    pub request_id: String,
    /// Command token; only set for `COMMAND` records.
    #[serde(default)]
    pub request_cmd: Option<String>,
    pub request_type: RequestType,
    /// Provider-facing correlation string; empty for commands.
    #[serde(default)]
    pub identifier: String,
    /// Logical request template name.
    #[serde(default)]
    pub request_name: String,
    /// Opaque body sent to the provider.
    #[serde(rename = "request_payload", default)]
    pub payload: serde_json::Value,
    /// Lower value is served first.
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Set when the record is enqueued.
    #[serde(rename = "timestamp", default = "Utc::now")]
    pub enqueued_at: DateTime<Utc>,
}

fn default_priority() -> i64 {
    DEFAULT_REQUEST_PRIORITY
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl RequestRecord {
    /// Create a data request with a fresh id and derived identifier.
    pub fn data_request(request_name: impl Into<String>, payload: serde_json::Value) -> Self {
        let request_id = Uuid::new_v4().to_string();
        let request_name = request_name.into();
        Self {
            identifier: derive_identifier(&request_name, &request_id),
            request_id,
            request_cmd: None,
            request_type: RequestType::DataRequest,
            request_name,
            payload,
            priority: DEFAULT_REQUEST_PRIORITY,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            enqueued_at: Utc::now(),
        }
    }

    /// Create a command record. The command token doubles as the request id.
    pub fn command(cmd: &ControlCommand) -> Self {
        let token = cmd.token().to_string();
        Self {
            request_id: token.clone(),
            request_cmd: Some(token),
            request_type: RequestType::Command,
            identifier: String::new(),
            request_name: String::new(),
            payload: serde_json::Value::Null,
            priority: DEFAULT_CMD_PRIORITY,
            retry_count: 0,
            max_retries: 1,
            enqueued_at: Utc::now(),
        }
    }

    /// Set priority.
    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Set maximum retries.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Check if this is a command record.
    pub fn is_command(&self) -> bool {
        self.request_type == RequestType::Command
    }

    /// The parsed command, for command records.
    pub fn command_token(&self) -> Option<ControlCommand> {
        if !self.is_command() {
            return None;
        }
        let token = self.request_cmd.as_deref().unwrap_or(&self.request_id);
        Some(ControlCommand::parse(token))
    }

    /// Check if another submission attempt is allowed.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Serialize to the queue wire format.
    pub fn to_wire(&self) -> Result<String, QueueError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse from the queue wire format.
    pub fn from_wire(raw: &str) -> Result<Self, QueueError> {
        let record: RequestRecord = serde_json::from_str(raw)?;
        if record.request_id.is_empty() {
            return Err(QueueError::InvalidEntry("empty request_id".to_string()));
        }
        if record.request_type == RequestType::Command && record.request_cmd.is_none() {
            return Err(QueueError::InvalidEntry(format!(
                "command {} has no request_cmd",
                record.request_id
            )));
        }
        Ok(record)
    }
}

/// Provider-facing identifier: request name plus the first six characters of the id.
pub fn derive_identifier(request_name: &str, request_id: &str) -> String {
    let prefix: String = request_id.chars().take(IDENTIFIER_ID_PREFIX).collect();
    format!("{}{}", request_name, prefix)
}
