use super::*;
use serde_json::json;

fn record(name: &str) -> RequestRecord {
    RequestRecord::data_request(name, json!({ "name": name }))
}

async fn backdate(store: &SqliteLifecycleStore, request_id: &str, days: i64) {
    let id = request_id.to_string();
    let past = timestamp(Utc::now() - Duration::days(days));
    store
        .connection()
        .unwrap()
        .call(move |conn| {
            conn.execute(
                "UPDATE requests SET updated_at = ?1 WHERE request_id = ?2",
                params![past, id],
            )?;
            Ok(())
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_track_and_get() {
    let store = SqliteLifecycleStore::in_memory().await.unwrap();
    let r = record("TsyBondStatic");
    store.track(&r).await.unwrap();

    let stored = store.get(&r.request_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Queued);
    assert_eq!(stored.record, r);
    assert!(store.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_retrack_keeps_status() {
    let store = SqliteLifecycleStore::in_memory().await.unwrap();
    let mut r = record("Bond");
    store.track(&r).await.unwrap();
    store.set_status(&r.request_id, RequestStatus::Submitted).await.unwrap();

    r.retry_count = 2;
    store.track(&r).await.unwrap();

    let stored = store.get(&r.request_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Submitted);
    assert_eq!(stored.record.retry_count, 2);
}

#[tokio::test]
async fn test_list_by_status_returns_records() {
    let store = SqliteLifecycleStore::in_memory().await.unwrap();
    let a = record("A");
    let b = record("B");
    store.track(&a).await.unwrap();
    store.track(&b).await.unwrap();
    store.set_status(&b.request_id, RequestStatus::Submitted).await.unwrap();

    let submitted = store.list_by_status(RequestStatus::Submitted).await.unwrap();
    assert_eq!(submitted, vec![b]);
    assert!(store.list_by_status(RequestStatus::Failed).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_ids_are_ignored() {
    let store = SqliteLifecycleStore::in_memory().await.unwrap();
    store.set_status("nope", RequestStatus::Error).await.unwrap();
    store.record_error("nope", "boom").await.unwrap();
    assert_eq!(store.record_poll("nope").await.unwrap(), 0);
}

#[tokio::test]
async fn test_error_message_and_poll_count() {
    let store = SqliteLifecycleStore::in_memory().await.unwrap();
    let r = record("Bond");
    store.track(&r).await.unwrap();

    assert_eq!(store.record_poll(&r.request_id).await.unwrap(), 1);
    assert_eq!(store.record_poll(&r.request_id).await.unwrap(), 2);
    store.set_status(&r.request_id, RequestStatus::Error).await.unwrap();
    store.record_error(&r.request_id, "Request not found").await.unwrap();

    let stored = store.get(&r.request_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Error);
    assert_eq!(stored.error_message.as_deref(), Some("Request not found"));
    assert_eq!(stored.poll_count, 2);
}

#[tokio::test]
async fn test_responses_round_trip() {
    let store = SqliteLifecycleStore::in_memory().await.unwrap();
    let response = ResponseRecord::new("id-1", "Bondid-1", ResponseKind::Csv, "text/csv", "a,b\n1,2")
        .with_key("Bondid-1.csv");
    store.store_response(response.clone()).await.unwrap();

    let stored = store.responses("id-1").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].key.as_deref(), Some("Bondid-1.csv"));
    assert_eq!(stored[0].content, response.content);
    assert_eq!(stored[0].kind, ResponseKind::Csv);
}

#[tokio::test]
async fn test_purge_old_terminal_records() {
    let store = SqliteLifecycleStore::in_memory().await.unwrap();
    let done = record("Done");
    let open = record("Open");
    store.track(&done).await.unwrap();
    store.track(&open).await.unwrap();
    store.set_status(&done.request_id, RequestStatus::Completed).await.unwrap();
    store
        .store_response(ResponseRecord::new(&done.request_id, "", ResponseKind::Raw, "text/plain", "x"))
        .await
        .unwrap();
    backdate(&store, &done.request_id, 10).await;
    backdate(&store, &open.request_id, 10).await;

    assert_eq!(store.purge_older_than(7).await.unwrap(), 1);
    assert!(store.get(&done.request_id).await.unwrap().is_none());
    assert!(store.get(&open.request_id).await.unwrap().is_some());
    assert!(store.responses(&done.request_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_closed_store_is_unavailable() {
    let store = SqliteLifecycleStore::in_memory().await.unwrap();
    store.close().await.unwrap();
    let err = store.get("x").await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_close_releases_file_for_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lifecycle.db");
    let r = record("Bond");

    let store = SqliteLifecycleStore::open(&path).await.unwrap();
    store.track(&r).await.unwrap();
    store.close().await.unwrap();
    store.close().await.unwrap();
    assert!(matches!(
        store.get(&r.request_id).await,
        Err(StoreError::Unavailable(_))
    ));

    let reopened = SqliteLifecycleStore::open(&path).await.unwrap();
    let stored = reopened.get(&r.request_id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Queued);
    reopened.close().await.unwrap();
}
