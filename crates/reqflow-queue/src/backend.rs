//! Sorted-set backends for the priority queue.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::QueueError;
use crate::record::RequestRecord;

/// A queue member with its ordering key.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    /// Serialized record; also the member's identity within the set.
    pub member: String,
    pub score: f64,
}

impl QueueEntry {
    pub fn new(member: impl Into<String>, score: f64) -> Self {
        Self {
            member: member.into(),
            score,
        }
    }

    /// Parse the member into a record.
    pub fn decode(&self) -> Result<RequestRecord, QueueError> {
        RequestRecord::from_wire(&self.member)
    }
}

/// Named sorted sets. Members are unique per set; equal scores order by member.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Backend identifier for logs.
    fn id(&self) -> &str;

    /// Insert a member, or update its score if already present.
    async fn add(&self, queue: &str, member: &str, score: f64) -> Result<(), QueueError>;

    /// Up to `count` lowest-score members, without removing them.
    async fn range(&self, queue: &str, count: usize) -> Result<Vec<QueueEntry>, QueueError>;

    /// Remove a member. Returns whether it was present.
    async fn remove(&self, queue: &str, member: &str) -> Result<bool, QueueError>;

    /// Remove every member. Returns how many were removed.
    async fn clear(&self, queue: &str) -> Result<usize, QueueError>;

    async fn len(&self, queue: &str) -> Result<usize, QueueError>;

    /// Release the underlying connection.
    async fn close(&self) -> Result<(), QueueError> {
        Ok(())
    }
}

/// Total order over scores.
#[derive(Debug, Clone, Copy)]
struct ScoreKey(f64);

impl PartialEq for ScoreKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoreKey {}

impl PartialOrd for ScoreKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoreKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Default)]
struct SortedSet {
    scores: HashMap<String, f64>,
    ordered: BTreeSet<(ScoreKey, String)>,
}

impl SortedSet {
    fn insert(&mut self, member: &str, score: f64) {
        if let Some(old) = self.scores.insert(member.to_string(), score) {
            self.ordered.remove(&(ScoreKey(old), member.to_string()));
        }
        self.ordered.insert((ScoreKey(score), member.to_string()));
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => self.ordered.remove(&(ScoreKey(score), member.to_string())),
            None => false,
        }
    }
}

/// In-process backend for tests and single-process deployments.
pub struct MemoryQueueBackend {
    sets: RwLock<HashMap<String, SortedSet>>,
    closed: AtomicBool,
}

impl MemoryQueueBackend {
    pub fn new() -> Self {
        Self {
            sets: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Unavailable("memory backend is closed".to_string()));
        }
        Ok(())
    }
}

impl Default for MemoryQueueBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueueBackend {
    fn id(&self) -> &str {
        "memory"
    }

    async fn add(&self, queue: &str, member: &str, score: f64) -> Result<(), QueueError> {
        self.ensure_open()?;
        let mut sets = self.sets.write().await;
        sets.entry(queue.to_string()).or_default().insert(member, score);
        Ok(())
    }

    async fn range(&self, queue: &str, count: usize) -> Result<Vec<QueueEntry>, QueueError> {
        self.ensure_open()?;
        let sets = self.sets.read().await;
        Ok(sets
            .get(queue)
            .map(|set| {
                set.ordered
                    .iter()
                    .take(count)
                    .map(|(score, member)| QueueEntry::new(member.clone(), score.0))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn remove(&self, queue: &str, member: &str) -> Result<bool, QueueError> {
        self.ensure_open()?;
        let mut sets = self.sets.write().await;
        Ok(sets.get_mut(queue).map(|set| set.remove(member)).unwrap_or(false))
    }

    async fn clear(&self, queue: &str) -> Result<usize, QueueError> {
        self.ensure_open()?;
        let mut sets = self.sets.write().await;
        Ok(sets.remove(queue).map(|set| set.scores.len()).unwrap_or(0))
    }

    async fn len(&self, queue: &str) -> Result<usize, QueueError> {
        self.ensure_open()?;
        let sets = self.sets.read().await;
        Ok(sets.get(queue).map(|set| set.scores.len()).unwrap_or(0))
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.closed.store(true, AtomicOrdering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_range_orders_by_score() {
        let backend = MemoryQueueBackend::new();
        backend.add("q", "b", 4.2).await.unwrap();
        backend.add("q", "a", 4.5).await.unwrap();
        backend.add("q", "c", 2.1).await.unwrap();

        let entries = backend.range("q", 10).await.unwrap();
        let members: Vec<_> = entries.iter().map(|e| e.member.as_str()).collect();
        assert_eq!(members, vec!["c", "b", "a"]);
    }

    #[tokio::test]
    async fn test_equal_scores_order_by_member() {
        let backend = MemoryQueueBackend::new();
        backend.add("q", "zeta", 4.0).await.unwrap();
        backend.add("q", "alpha", 4.0).await.unwrap();

        let entries = backend.range("q", 2).await.unwrap();
        assert_eq!(entries[0].member, "alpha");
    }

    #[tokio::test]
    async fn test_add_existing_member_updates_score() {
        let backend = MemoryQueueBackend::new();
        backend.add("q", "a", 5.0).await.unwrap();
        backend.add("q", "b", 4.0).await.unwrap();
        backend.add("q", "a", 1.0).await.unwrap();

        assert_eq!(backend.len("q").await.unwrap(), 2);
        let entries = backend.range("q", 1).await.unwrap();
        assert_eq!(entries[0], QueueEntry::new("a", 1.0));
    }

    #[tokio::test]
    async fn test_queues_are_independent() {
        let backend = MemoryQueueBackend::new();
        backend.add("inbound", "a", 1.0).await.unwrap();
        backend.add("commands", "b", 1.0).await.unwrap();

        assert_eq!(backend.clear("inbound").await.unwrap(), 1);
        assert_eq!(backend.len("inbound").await.unwrap(), 0);
        assert_eq!(backend.len("commands").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_remove_absent() {
        let backend = MemoryQueueBackend::new();
        assert!(!backend.remove("missing", "x").await.unwrap());
        backend.add("q", "x", 1.0).await.unwrap();
        assert!(backend.remove("q", "x").await.unwrap());
        assert!(!backend.remove("q", "x").await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_backend_is_unavailable() {
        let backend = MemoryQueueBackend::new();
        backend.close().await.unwrap();
        assert!(backend.is_closed());
        let err = backend.add("q", "x", 1.0).await.unwrap_err();
        assert!(err.is_transient());
    }
}
