//! # reqflow Store
//!
//! Durable request lifecycle status for reqflow.
//!
//! Records move `queued → processing → submitted → completed | error | failed`.
//! Every write is keyed by `request_id`, so a duplicate delivery rewrites the
//! same row instead of creating a second one.

pub mod error;
pub mod memory;
pub mod model;
pub mod schema;
pub mod sqlite;
pub mod status;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryLifecycleStore;
pub use model::{ResponseKind, ResponseRecord, StoredRequest};
pub use sqlite::SqliteLifecycleStore;
pub use status::RequestStatus;
pub use store::LifecycleStore;

use std::sync::Arc;

use reqflow_config::{BackendKind, StoreConfig};

/// Open the store selected by the configuration.
pub async fn open_store(config: &StoreConfig) -> Result<Arc<dyn LifecycleStore>, StoreError> {
    match config.backend {
        BackendKind::Memory => Ok(Arc::new(MemoryLifecycleStore::new())),
        BackendKind::Sqlite => {
            let path = config
                .db_path
                .as_ref()
                .ok_or_else(|| StoreError::Unavailable("store.db_path is not set".to_string()))?;
            Ok(Arc::new(SqliteLifecycleStore::open(path).await?))
        }
    }
}
