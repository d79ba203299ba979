//! # reqflow Queue
//!
//! Priority-ordered work queue for the reqflow request lifecycle engine.
//!
//! ## Features
//!
//! - One canonical [`RequestRecord`], parsed once at the queue boundary
//! - Control-command vocabulary shared by producers and loops
//! - Insertion-order tiebreak that never crosses a priority unit
//! - Peek-then-remove protocol (at-least-once delivery)
//! - Memory and SQLite sorted-set backends

pub mod backend;
pub mod command;
pub mod error;
pub mod payload;
pub mod queue;
pub mod record;
pub mod score;
pub mod sqlite;

pub use backend::{MemoryQueueBackend, QueueBackend, QueueEntry};
pub use command::ControlCommand;
pub use error::QueueError;
pub use payload::DataRequestSpec;
pub use queue::PriorityQueue;
pub use record::{
    RequestRecord, RequestType, DEFAULT_CMD_PRIORITY, DEFAULT_REQUEST_PRIORITY, HIGH_CMD_PRIORITY,
    HIGH_REQUEST_PRIORITY, LAST_CMD_PRIORITY, LOWEST_REQUEST_PRIORITY,
};
pub use score::TieBreaker;
pub use sqlite::SqliteQueueBackend;

use std::sync::Arc;

use reqflow_config::{BackendKind, QueueConfig};

/// Open the backend selected by the queue configuration.
pub async fn open_backend(config: &QueueConfig) -> Result<Arc<dyn QueueBackend>, QueueError> {
    match config.backend {
        BackendKind::Memory => Ok(Arc::new(MemoryQueueBackend::new())),
        BackendKind::Sqlite => {
            let path = config
                .db_path
                .as_ref()
                .ok_or_else(|| QueueError::Unavailable("queue.db_path is not set".to_string()))?;
            Ok(Arc::new(SqliteQueueBackend::open(path).await?))
        }
    }
}
