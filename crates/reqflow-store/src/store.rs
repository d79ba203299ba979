//! Lifecycle store trait.

use async_trait::async_trait;

use reqflow_queue::RequestRecord;

use crate::error::StoreError;
use crate::model::{ResponseRecord, StoredRequest};
use crate::status::RequestStatus;

/// Durable request status, mutated only by the submitter and poller loops.
///
/// Writes are keyed by `request_id`; unknown ids are ignored.
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    /// Backend identifier for logs.
    fn id(&self) -> &str;

    /// Insert a record as `queued`, or refresh an existing row keeping its status.
    async fn track(&self, record: &RequestRecord) -> Result<(), StoreError>;

    async fn set_status(&self, request_id: &str, status: RequestStatus) -> Result<(), StoreError>;

    /// Persist a failure message against the record.
    async fn record_error(&self, request_id: &str, message: &str) -> Result<(), StoreError>;

    /// Records currently in `status`, oldest first.
    async fn list_by_status(&self, status: RequestStatus) -> Result<Vec<RequestRecord>, StoreError>;

    async fn get(&self, request_id: &str) -> Result<Option<StoredRequest>, StoreError>;

    /// Count one poll attempt and return the new total.
    async fn record_poll(&self, request_id: &str) -> Result<u32, StoreError>;

    /// Persist handled response content.
    async fn store_response(&self, response: ResponseRecord) -> Result<(), StoreError>;

    /// Responses stored for a request, oldest first.
    async fn responses(&self, request_id: &str) -> Result<Vec<ResponseRecord>, StoreError>;

    /// Delete terminal records last touched more than `days` ago, with their responses.
    async fn purge_older_than(&self, days: u32) -> Result<usize, StoreError>;

    /// Release the underlying connection.
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
