//! Priority queue handle.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::backend::{QueueBackend, QueueEntry};
use crate::command::ControlCommand;
use crate::error::QueueError;
use crate::record::RequestRecord;
use crate::score::TieBreaker;

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

/// A handle onto one named sorted set of a backend.
///
/// Reads are non-destructive: `dequeue_batch` only peeks, and the caller
/// acknowledges an entry with `remove` once it reached a terminal outcome.
#[derive(Clone)]
pub struct PriorityQueue {
    backend: Arc<dyn QueueBackend>,
    target: String,
    tiebreaker: Arc<TieBreaker>,
}

impl PriorityQueue {
    /// Create a handle on the named queue.
    pub fn new(backend: Arc<dyn QueueBackend>, target: impl Into<String>) -> Self {
        Self {
            backend,
            target: target.into(),
            tiebreaker: Arc::new(TieBreaker::new()),
        }
    }

    /// Name of the queue this handle addresses.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Repoint this handle at another queue on the same backend.
    pub fn rename_target(&mut self, target: impl Into<String>) {
        let target = target.into();
        debug!("Queue handle retargeted: {} -> {}", self.target, target);
        self.target = target;
    }

    /// A second handle on the same backend and enqueue counter.
    pub fn with_target(&self, target: impl Into<String>) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            target: target.into(),
            tiebreaker: Arc::clone(&self.tiebreaker),
        }
    }

    /// Stamp, serialize and insert a record.
    pub async fn enqueue(&self, record: &RequestRecord) -> Result<QueueEntry, QueueError> {
        let mut record = record.clone();
        record.enqueued_at = Utc::now();
        let member = record.to_wire()?;
        let score = self.tiebreaker.score(record.priority);
        self.backend.add(&self.target, &member, score).await?;
        debug!(
            "Enqueued {} on {} with score {:.10}",
            record.request_id, self.target, score
        );
        Ok(QueueEntry::new(member, score))
    }

    /// Enqueue a control command.
    pub async fn enqueue_command(
        &self,
        command: &ControlCommand,
        priority: i64,
    ) -> Result<QueueEntry, QueueError> {
        let record = RequestRecord::command(command).with_priority(priority);
        info!("Sending command {} to {} (priority {})", command, self.target, priority);
        self.enqueue(&record).await
    }

    /// Insert an already-serialized member with a given score.
    pub async fn enqueue_raw(&self, member: &str, score: f64) -> Result<(), QueueError> {
        self.backend.add(&self.target, member, score).await
    }

    /// Up to `max_items` lowest-key entries, left in place.
    pub async fn dequeue_batch(&self, max_items: usize) -> Result<Vec<QueueEntry>, QueueError> {
        if max_items == 0 {
            return Ok(Vec::new());
        }
        self.backend.range(&self.target, max_items).await
    }

    /// Acknowledge an entry. Removing an absent entry is not an error.
    pub async fn remove(&self, member: &str) -> Result<bool, QueueError> {
        let removed = self.backend.remove(&self.target, member).await?;
        if !removed {
            debug!("Entry already absent from {}", self.target);
        }
        Ok(removed)
    }

    /// Empty the queue, returning the number of entries dropped.
    pub async fn clear(&self) -> Result<usize, QueueError> {
        let removed = self.backend.clear(&self.target).await?;
        info!("Cleared {} entries from {}", removed, self.target);
        Ok(removed)
    }

    pub async fn len(&self) -> Result<usize, QueueError> {
        self.backend.len(&self.target).await
    }

    pub async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }

    /// Release the backend connection.
    pub async fn close(&self) -> Result<(), QueueError> {
        debug!("Closing {} queue backend", self.backend.id());
        self.backend.close().await
    }
}

impl std::fmt::Debug for PriorityQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("backend", &self.backend.id())
            .field("target", &self.target)
            .finish()
    }
}
