use super::*;
use crate::model::ResponseKind;
use serde_json::json;

fn record(name: &str) -> RequestRecord {
    RequestRecord::data_request(name, json!({ "name": name }))
}

#[tokio::test]
async fn test_track_inserts_queued() {
    let store = MemoryLifecycleStore::new();
    let r = record("Bond");
    store.track(&r).await.unwrap();

    let stored = store.get(&r.request_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Queued);
    assert_eq!(stored.record.identifier, r.identifier);
}

#[tokio::test]
async fn test_track_twice_keeps_one_row_and_status() {
    let store = MemoryLifecycleStore::new();
    let mut r = record("Bond");
    store.track(&r).await.unwrap();
    store.set_status(&r.request_id, RequestStatus::Processing).await.unwrap();

    r.retry_count = 1;
    store.track(&r).await.unwrap();

    let stored = store.get(&r.request_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Processing);
    assert_eq!(stored.record.retry_count, 1);
    assert_eq!(store.requests.read().await.len(), 1);
}

#[tokio::test]
async fn test_set_status_unknown_is_noop() {
    let store = MemoryLifecycleStore::new();
    store.set_status("missing", RequestStatus::Failed).await.unwrap();
    assert!(store.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_list_by_status() {
    let store = MemoryLifecycleStore::new();
    let a = record("A");
    let b = record("B");
    let c = record("C");
    for r in [&a, &b, &c] {
        store.track(r).await.unwrap();
    }
    store.set_status(&a.request_id, RequestStatus::Submitted).await.unwrap();
    store.set_status(&c.request_id, RequestStatus::Submitted).await.unwrap();

    let submitted = store.list_by_status(RequestStatus::Submitted).await.unwrap();
    let ids: Vec<_> = submitted.iter().map(|r| r.request_id.clone()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&a.request_id));
    assert!(ids.contains(&c.request_id));
    assert_eq!(store.list_by_status(RequestStatus::Queued).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_record_error_and_poll() {
    let store = MemoryLifecycleStore::new();
    let r = record("Bond");
    store.track(&r).await.unwrap();

    assert_eq!(store.record_poll(&r.request_id).await.unwrap(), 1);
    assert_eq!(store.record_poll(&r.request_id).await.unwrap(), 2);
    assert_eq!(store.record_poll("missing").await.unwrap(), 0);

    store.record_error(&r.request_id, "Request not found").await.unwrap();
    let stored = store.get(&r.request_id).await.unwrap().unwrap();
    assert_eq!(stored.error_message.as_deref(), Some("Request not found"));
    assert_eq!(stored.poll_count, 2);
}

#[tokio::test]
async fn test_store_and_list_responses() {
    let store = MemoryLifecycleStore::new();
    store
        .store_response(ResponseRecord::new("id-1", "Bondid-1", ResponseKind::Csv, "text/csv", "a,b\n1,2"))
        .await
        .unwrap();
    store
        .store_response(ResponseRecord::new("id-2", "Bondid-2", ResponseKind::Raw, "text/plain", "x"))
        .await
        .unwrap();

    let responses = store.responses("id-1").await.unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].kind, ResponseKind::Csv);
}

#[tokio::test]
async fn test_purge_only_old_terminal_records() {
    let store = MemoryLifecycleStore::new();
    let old_done = record("Old");
    let old_open = record("Open");
    let fresh_done = record("Fresh");
    for r in [&old_done, &old_open, &fresh_done] {
        store.track(r).await.unwrap();
    }
    store.set_status(&old_done.request_id, RequestStatus::Completed).await.unwrap();
    store.set_status(&fresh_done.request_id, RequestStatus::Failed).await.unwrap();
    store
        .store_response(ResponseRecord::new(&old_done.request_id, "", ResponseKind::Raw, "text/plain", "x"))
        .await
        .unwrap();

    {
        let mut requests = store.requests.write().await;
        let past = Utc::now() - Duration::days(30);
        requests.get_mut(&old_done.request_id).unwrap().updated_at = past;
        requests.get_mut(&old_open.request_id).unwrap().updated_at = past;
    }

    assert_eq!(store.purge_older_than(7).await.unwrap(), 1);
    assert!(store.get(&old_done.request_id).await.unwrap().is_none());
    assert!(store.get(&old_open.request_id).await.unwrap().is_some());
    assert!(store.get(&fresh_done.request_id).await.unwrap().is_some());
    assert!(store.responses(&old_done.request_id).await.unwrap().is_empty());
}
