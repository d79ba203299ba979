//! Ordering and durability tests across queue backends.

use std::sync::Arc;

use serde_json::json;

use reqflow_queue::{
    ControlCommand, MemoryQueueBackend, PriorityQueue, QueueBackend, RequestRecord,
    SqliteQueueBackend, HIGH_CMD_PRIORITY,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn record(id: &str, priority: i64) -> RequestRecord {
    let mut record = RequestRecord::data_request("Ordering", json!({})).with_priority(priority);
    record.request_id = id.to_string();
    record
}

async fn drain_ids(queue: &PriorityQueue, max: usize) -> Vec<String> {
    queue
        .dequeue_batch(max)
        .await
        .unwrap()
        .iter()
        .map(|e| e.decode().unwrap().request_id)
        .collect()
}

async fn check_priority_then_fifo(backend: Arc<dyn QueueBackend>) {
    let queue = PriorityQueue::new(backend, "inbound");
    queue.enqueue(&record("A", 4)).await.unwrap();
    queue.enqueue(&record("B", 4)).await.unwrap();
    queue.enqueue(&record("C", 2)).await.unwrap();

    assert_eq!(drain_ids(&queue, 3).await, vec!["C", "A", "B"]);
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn test_memory_priority_then_fifo() {
    check_priority_then_fifo(Arc::new(MemoryQueueBackend::new())).await;
}

#[tokio::test]
async fn test_sqlite_priority_then_fifo() {
    check_priority_then_fifo(Arc::new(SqliteQueueBackend::in_memory().await.unwrap())).await;
}

#[tokio::test]
async fn test_distinct_priorities_in_any_order() {
    let queue = PriorityQueue::new(Arc::new(MemoryQueueBackend::new()), "inbound");
    for p in [9, 3, 7, 4, 2, 8] {
        queue.enqueue(&record(&format!("p{}", p), p)).await.unwrap();
    }
    assert_eq!(
        drain_ids(&queue, 6).await,
        vec!["p2", "p3", "p4", "p7", "p8", "p9"]
    );
}

#[tokio::test]
async fn test_equal_priority_keeps_enqueue_order() {
    let queue = PriorityQueue::new(Arc::new(MemoryQueueBackend::new()), "inbound");
    let expected: Vec<String> = (0..200).map(|i| format!("r{:03}", i)).collect();
    for id in &expected {
        queue.enqueue(&record(id, 4)).await.unwrap();
    }
    assert_eq!(drain_ids(&queue, 200).await, expected);
}

#[tokio::test]
async fn test_exit_command_precedes_later_work() {
    let queue = PriorityQueue::new(Arc::new(MemoryQueueBackend::new()), "inbound");
    queue.enqueue(&record("early", 4)).await.unwrap();
    queue
        .enqueue_command(&ControlCommand::Exit, HIGH_CMD_PRIORITY)
        .await
        .unwrap();
    queue.enqueue(&record("late", 4)).await.unwrap();

    assert_eq!(drain_ids(&queue, 3).await, vec!["EXIT", "early", "late"]);
}

// ============================================================================
// Durability
// ============================================================================

#[tokio::test]
async fn test_sqlite_entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("queue.db");

    {
        let backend = Arc::new(SqliteQueueBackend::open(&path).await.unwrap());
        let queue = PriorityQueue::new(backend, "inbound");
        queue.enqueue(&record("A", 5)).await.unwrap();
        queue.enqueue(&record("B", 3)).await.unwrap();
        queue.close().await.unwrap();
    }

    let backend = Arc::new(SqliteQueueBackend::open(&path).await.unwrap());
    let queue = PriorityQueue::new(backend, "inbound");
    assert_eq!(drain_ids(&queue, 10).await, vec!["B", "A"]);
}

#[tokio::test]
async fn test_two_handles_share_sqlite_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");

    let producer = PriorityQueue::new(
        Arc::new(SqliteQueueBackend::open(&path).await.unwrap()),
        "inbound",
    );
    let consumer = PriorityQueue::new(
        Arc::new(SqliteQueueBackend::open(&path).await.unwrap()),
        "inbound",
    );

    let entry = producer.enqueue(&record("A", 4)).await.unwrap();
    let batch = consumer.dequeue_batch(1).await.unwrap();
    assert_eq!(batch[0].member, entry.member);

    assert!(consumer.remove(&entry.member).await.unwrap());
    assert!(producer.is_empty().await.unwrap());
}
