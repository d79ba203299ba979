//! Scripted collaborators for loop tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use reqflow_queue::{MemoryQueueBackend, QueueBackend, QueueEntry, QueueError, RequestRecord};
use reqflow_store::{
    LifecycleStore, MemoryLifecycleStore, RequestStatus, ResponseRecord, StoreError,
    StoredRequest,
};

use crate::provider::{DataProvider, PollResponse, ProviderError, SubmitResponse};

/// Memory backend whose `close` is only counted, so tests can inspect the
/// queue after a loop released it.
#[derive(Default)]
pub struct InspectableBackend {
    inner: MemoryQueueBackend,
    pub closes: AtomicU32,
}

impl InspectableBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl QueueBackend for InspectableBackend {
    fn id(&self) -> &str {
        "inspectable"
    }

    async fn add(&self, queue: &str, member: &str, score: f64) -> Result<(), QueueError> {
        self.inner.add(queue, member, score).await
    }

    async fn range(&self, queue: &str, count: usize) -> Result<Vec<QueueEntry>, QueueError> {
        self.inner.range(queue, count).await
    }

    async fn remove(&self, queue: &str, member: &str) -> Result<bool, QueueError> {
        self.inner.remove(queue, member).await
    }

    async fn clear(&self, queue: &str) -> Result<usize, QueueError> {
        self.inner.clear(queue).await
    }

    async fn len(&self, queue: &str) -> Result<usize, QueueError> {
        self.inner.len(queue).await
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Provider that replays queued replies.
///
/// Submissions without a scripted reply are accepted with 200; polls without
/// one return 200 with no items.
#[derive(Default)]
pub struct ScriptedProvider {
    submits: Mutex<VecDeque<Result<SubmitResponse, ProviderError>>>,
    polls: Mutex<HashMap<String, VecDeque<Result<PollResponse, ProviderError>>>>,
    downloads: Mutex<HashMap<String, String>>,
    pub submitted: Mutex<Vec<serde_json::Value>>,
    pub polled: Mutex<Vec<String>>,
    pub refreshes: AtomicU32,
    pub closed: AtomicBool,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_submit(&self, reply: Result<SubmitResponse, ProviderError>) {
        self.submits.lock().await.push_back(reply);
    }

    pub async fn push_poll(&self, identifier: &str, reply: Result<PollResponse, ProviderError>) {
        self.polls
            .lock()
            .await
            .entry(identifier.to_string())
            .or_default()
            .push_back(reply);
    }

    pub async fn set_download(&self, key: &str, content: &str) {
        self.downloads
            .lock()
            .await
            .insert(key.to_string(), content.to_string());
    }

    pub async fn submit_count(&self) -> usize {
        self.submitted.lock().await.len()
    }

    pub async fn poll_count(&self, identifier: &str) -> usize {
        self.polled
            .lock()
            .await
            .iter()
            .filter(|id| id.as_str() == identifier)
            .count()
    }
}

#[async_trait]
impl DataProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, payload: &serde_json::Value) -> Result<SubmitResponse, ProviderError> {
        self.submitted.lock().await.push(payload.clone());
        self.submits
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(SubmitResponse::new(200, "{}")))
    }

    async fn poll(&self, identifier: &str) -> Result<PollResponse, ProviderError> {
        self.polled.lock().await.push(identifier.to_string());
        self.polls
            .lock()
            .await
            .get_mut(identifier)
            .and_then(|replies| replies.pop_front())
            .unwrap_or_else(|| Ok(PollResponse::ready(Vec::new())))
    }

    async fn download(&self, key: &str) -> Result<String, ProviderError> {
        self.downloads
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ProviderError::InvalidResponse(format!("no content for {}", key)))
    }

    async fn refresh_auth(&self) -> Result<(), ProviderError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> Result<(), ProviderError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Memory store that fails `track` and `record_poll` for chosen request ids.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryLifecycleStore,
    failing: std::sync::Mutex<HashSet<String>>,
}

impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_for(&self, request_id: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(request_id.to_string());
    }

    fn check(&self, request_id: &str) -> Result<(), StoreError> {
        if self.failing.lock().unwrap().contains(request_id) {
            return Err(StoreError::Query("row corrupt".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LifecycleStore for FaultyStore {
    fn id(&self) -> &str {
        "faulty"
    }

    async fn track(&self, record: &RequestRecord) -> Result<(), StoreError> {
        self.check(&record.request_id)?;
        self.inner.track(record).await
    }

    async fn set_status(&self, request_id: &str, status: RequestStatus) -> Result<(), StoreError> {
        self.inner.set_status(request_id, status).await
    }

    async fn record_error(&self, request_id: &str, message: &str) -> Result<(), StoreError> {
        self.inner.record_error(request_id, message).await
    }

    async fn list_by_status(&self, status: RequestStatus) -> Result<Vec<RequestRecord>, StoreError> {
        self.inner.list_by_status(status).await
    }

    async fn get(&self, request_id: &str) -> Result<Option<StoredRequest>, StoreError> {
        self.inner.get(request_id).await
    }

    async fn record_poll(&self, request_id: &str) -> Result<u32, StoreError> {
        self.check(request_id)?;
        self.inner.record_poll(request_id).await
    }

    async fn store_response(&self, response: ResponseRecord) -> Result<(), StoreError> {
        self.inner.store_response(response).await
    }

    async fn responses(&self, request_id: &str) -> Result<Vec<ResponseRecord>, StoreError> {
        self.inner.responses(request_id).await
    }

    async fn purge_older_than(&self, days: u32) -> Result<usize, StoreError> {
        self.inner.purge_older_than(days).await
    }
}
