//! Lifecycle behavior shared by every store backend.

use std::sync::Arc;

use serde_json::json;

use reqflow_queue::RequestRecord;
use reqflow_store::{
    LifecycleStore, MemoryLifecycleStore, RequestStatus, SqliteLifecycleStore,
};

async fn stores() -> Vec<Arc<dyn LifecycleStore>> {
    vec![
        Arc::new(MemoryLifecycleStore::new()),
        Arc::new(SqliteLifecycleStore::in_memory().await.unwrap()),
    ]
}

#[tokio::test]
async fn test_full_lifecycle_on_every_backend() {
    for store in stores().await {
        let record = RequestRecord::data_request("Bond", json!({}));
        let id = record.request_id.clone();

        store.track(&record).await.unwrap();
        for status in [
            RequestStatus::Processing,
            RequestStatus::Submitted,
            RequestStatus::Completed,
        ] {
            store.set_status(&id, status).await.unwrap();
            assert_eq!(store.get(&id).await.unwrap().unwrap().status, status, "{}", store.id());
        }
        assert!(store.list_by_status(RequestStatus::Submitted).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_duplicate_delivery_rewrites_same_row() {
    for store in stores().await {
        let record = RequestRecord::data_request("Bond", json!({}));
        store.track(&record).await.unwrap();
        store.set_status(&record.request_id, RequestStatus::Submitted).await.unwrap();

        // Redelivery of the same entry after a crash between peek and remove.
        store.track(&record).await.unwrap();
        store.set_status(&record.request_id, RequestStatus::Submitted).await.unwrap();

        let submitted = store.list_by_status(RequestStatus::Submitted).await.unwrap();
        assert_eq!(submitted.len(), 1, "{}", store.id());
    }
}

#[tokio::test]
async fn test_sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lifecycle.db");
    let record = RequestRecord::data_request("Bond", json!({"k": "v"}));

    {
        let store = SqliteLifecycleStore::open(&path).await.unwrap();
        store.track(&record).await.unwrap();
        store.set_status(&record.request_id, RequestStatus::Failed).await.unwrap();
        store.record_error(&record.request_id, "HTTP 500").await.unwrap();
        store.close().await.unwrap();
    }

    let store = SqliteLifecycleStore::open(&path).await.unwrap();
    let stored = store.get(&record.request_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Failed);
    assert_eq!(stored.error_message.as_deref(), Some("HTTP 500"));
    assert_eq!(stored.record.payload["k"], "v");
}
