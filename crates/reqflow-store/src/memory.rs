//! In-memory lifecycle store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use reqflow_queue::RequestRecord;

use crate::error::StoreError;
use crate::model::{ResponseRecord, StoredRequest};
use crate::status::RequestStatus;
use crate::store::LifecycleStore;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Lifecycle store kept in process memory, for tests and one-shot runs.
pub struct MemoryLifecycleStore {
    requests: RwLock<HashMap<String, StoredRequest>>,
    responses: RwLock<Vec<ResponseRecord>>,
}

impl MemoryLifecycleStore {
    pub fn new() -> Self {
        Self {
            requests: RwLock::new(HashMap::new()),
            responses: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryLifecycleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LifecycleStore for MemoryLifecycleStore {
    fn id(&self) -> &str {
        "memory"
    }

    async fn track(&self, record: &RequestRecord) -> Result<(), StoreError> {
        let mut requests = self.requests.write().await;
        requests
            .entry(record.request_id.clone())
            .and_modify(|stored| stored.refresh(record))
            .or_insert_with(|| StoredRequest::new(record.clone()));
        Ok(())
    }

    async fn set_status(&self, request_id: &str, status: RequestStatus) -> Result<(), StoreError> {
        let mut requests = self.requests.write().await;
        match requests.get_mut(request_id) {
            Some(stored) => {
                stored.status = status;
                stored.updated_at = Utc::now();
            }
            None => debug!("set_status({}) ignored for unknown request {}", status, request_id),
        }
        Ok(())
    }

    async fn record_error(&self, request_id: &str, message: &str) -> Result<(), StoreError> {
        let mut requests = self.requests.write().await;
        match requests.get_mut(request_id) {
            Some(stored) => {
                stored.error_message = Some(message.to_string());
                stored.updated_at = Utc::now();
            }
            None => debug!("record_error ignored for unknown request {}", request_id),
        }
        Ok(())
    }

    async fn list_by_status(&self, status: RequestStatus) -> Result<Vec<RequestRecord>, StoreError> {
        let requests = self.requests.read().await;
        let mut matching: Vec<&StoredRequest> =
            requests.values().filter(|s| s.status == status).collect();
        matching.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.request_id().cmp(b.request_id()))
        });
        Ok(matching.into_iter().map(|s| s.record.clone()).collect())
    }

    async fn get(&self, request_id: &str) -> Result<Option<StoredRequest>, StoreError> {
        let requests = self.requests.read().await;
        Ok(requests.get(request_id).cloned())
    }

    async fn record_poll(&self, request_id: &str) -> Result<u32, StoreError> {
        let mut requests = self.requests.write().await;
        Ok(match requests.get_mut(request_id) {
            Some(stored) => {
                stored.poll_count += 1;
                stored.updated_at = Utc::now();
                stored.poll_count
            }
            None => 0,
        })
    }

    async fn store_response(&self, response: ResponseRecord) -> Result<(), StoreError> {
        self.responses.write().await.push(response);
        Ok(())
    }

    async fn responses(&self, request_id: &str) -> Result<Vec<ResponseRecord>, StoreError> {
        let responses = self.responses.read().await;
        Ok(responses
            .iter()
            .filter(|r| r.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn purge_older_than(&self, days: u32) -> Result<usize, StoreError> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let mut requests = self.requests.write().await;
        let expired: Vec<String> = requests
            .values()
            .filter(|s| s.status.is_terminal() && s.updated_at < cutoff)
            .map(|s| s.request_id().to_string())
            .collect();
        for id in &expired {
            requests.remove(id);
        }

        let mut responses = self.responses.write().await;
        responses.retain(|r| !expired.contains(&r.request_id));
        Ok(expired.len())
    }
}
