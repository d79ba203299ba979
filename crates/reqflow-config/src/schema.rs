//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub submitter: SubmitterConfig,

    #[serde(default)]
    pub poller: PollerConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Data-pull command templates resolved by the request builder.
    #[serde(default)]
    pub templates: Vec<RequestTemplate>,
}

/// Storage backend selection shared by the queue and the lifecycle store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local, non-durable.
    #[default]
    Memory,
    /// SQLite database file, shareable between processes.
    Sqlite,
}

/// Queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Database path for the sqlite backend.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    #[serde(default = "default_request_queue")]
    pub request_queue: String,

    #[serde(default = "default_response_queue")]
    pub response_queue: String,

    #[serde(default = "default_command_queue")]
    pub command_queue: String,

    #[serde(default = "default_error_queue")]
    pub error_queue: String,

    /// Copy undecodable entries and exhausted records to the error queue.
    #[serde(default = "default_true")]
    pub dead_letter_enabled: bool,
}

fn default_request_queue() -> String {
    "REQFLOW:request_queue".to_string()
}

fn default_response_queue() -> String {
    "REQFLOW:response_queue".to_string()
}

fn default_command_queue() -> String {
    "REQFLOW:command_queue".to_string()
}

fn default_error_queue() -> String {
    "REQFLOW:error_queue".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            db_path: None,
            request_queue: default_request_queue(),
            response_queue: default_response_queue(),
            command_queue: default_command_queue(),
            error_queue: default_error_queue(),
            dead_letter_enabled: default_true(),
        }
    }
}

impl QueueConfig {
    /// All configured queue names, in declaration order.
    pub fn names(&self) -> [&str; 4] {
        [
            &self.request_queue,
            &self.response_queue,
            &self.command_queue,
            &self.error_queue,
        ]
    }
}

/// Lifecycle store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Age in days after which terminal records are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_retention_days() -> u32 {
    7
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            db_path: None,
            retention_days: default_retention_days(),
        }
    }
}

/// External data provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Account catalog the requests are filed under.
    #[serde(default)]
    pub catalog: String,

    /// Bearer token used verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Environment variable re-read whenever the token is refreshed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://api.bloomberg.com".to_string()
}

fn default_api_version() -> String {
    "2".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            catalog: String::new(),
            token: None,
            token_env: None,
            api_version: default_api_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Submitter loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitterConfig {
    /// Entries peeked per iteration.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Idle backoff floor.
    #[serde(default = "default_min_wait_secs")]
    pub min_wait_secs: u64,

    /// Idle backoff ceiling.
    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    /// Iteration bound; negative means unbounded.
    #[serde(default = "default_max_loops")]
    pub max_loops: i64,

    /// Pause after a transient queue or store failure.
    #[serde(default = "default_error_backoff_secs")]
    pub error_backoff_secs: u64,
}

fn default_batch_size() -> usize {
    5
}

fn default_min_wait_secs() -> u64 {
    2
}

fn default_max_wait_secs() -> u64 {
    20
}

fn default_max_loops() -> i64 {
    -1
}

fn default_error_backoff_secs() -> u64 {
    5
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            min_wait_secs: default_min_wait_secs(),
            max_wait_secs: default_max_wait_secs(),
            max_loops: default_max_loops(),
            error_backoff_secs: default_error_backoff_secs(),
        }
    }
}

/// Poller loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Exit once no submitted requests remain instead of sleeping.
    #[serde(default)]
    pub run_to_completion: bool,

    /// Cap on unsuccessful poll replies before a record is marked `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_poll_attempts: Option<u32>,
}

fn default_poll_interval_secs() -> u64 {
    15
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            run_to_completion: false,
            max_poll_attempts: None,
        }
    }
}

/// Retry delay growth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// `2 * retry_count` seconds.
    #[default]
    Linear,
    /// `2 ^ retry_count` seconds.
    Exponential,
}

/// Submission retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default)]
    pub backoff: BackoffKind,

    /// Added to a record's priority on each retry.
    #[serde(default = "default_priority_step")]
    pub priority_step: i64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_priority_step() -> i64 {
    1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff: BackoffKind::default(),
            priority_step: default_priority_step(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("./logs")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: default_log_directory(),
        }
    }
}

/// A data-pull command template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestTemplate {
    /// Command token that selects this template (matched case-insensitively).
    pub command: String,

    pub request_name: String,

    #[serde(default)]
    pub title: String,

    #[serde(default = "default_identifier_type")]
    pub identifier_type: String,

    #[serde(default)]
    pub identifiers: Vec<String>,

    #[serde(default)]
    pub fields: Vec<String>,

    #[serde(default = "default_output_format")]
    pub output_format: String,

    #[serde(default = "default_template_priority")]
    pub priority: i64,
}

fn default_identifier_type() -> String {
    "CUSIP".to_string()
}

fn default_output_format() -> String {
    "text/csv".to_string()
}

fn default_template_priority() -> i64 {
    4
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
