//! SQLite sorted-set backend.
//!
//! Entries survive restarts; several processes may share one database file.

use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::params;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::backend::{QueueBackend, QueueEntry};
use crate::error::QueueError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS queue_entries (
    queue_name TEXT NOT NULL,
    member TEXT NOT NULL,
    score REAL NOT NULL,
    PRIMARY KEY (queue_name, member)
);

CREATE INDEX IF NOT EXISTS idx_queue_entries_score ON queue_entries(queue_name, score, member);
"#;

/// Sorted sets stored in one SQLite table keyed by queue name.
pub struct SqliteQueueBackend {
    /// Taken on close, which releases the database handle.
    conn: RwLock<Option<Connection>>,
}

impl SqliteQueueBackend {
    /// Open or create a file-backed queue database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening queue database at {}", path.display());
        let conn = Connection::open(path).await?;
        conn.call(|conn| {
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            Ok(())
        })
        .await?;
        Self::init(conn).await
    }

    /// Create a private in-memory database.
    pub async fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, QueueError> {
        conn.call(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        Ok(Self {
            conn: RwLock::new(Some(conn)),
        })
    }

    /// Handle on the open connection, or `Unavailable` once closed.
    fn connection(&self) -> Result<Connection, QueueError> {
        self.conn
            .read()
            .map_err(|_| QueueError::Unavailable("sqlite backend lock poisoned".to_string()))?
            .clone()
            .ok_or_else(|| QueueError::Unavailable("sqlite backend is closed".to_string()))
    }
}

#[async_trait]
impl QueueBackend for SqliteQueueBackend {
    fn id(&self) -> &str {
        "sqlite"
    }

    async fn add(&self, queue: &str, member: &str, score: f64) -> Result<(), QueueError> {
        let conn = self.connection()?;
        let queue = queue.to_string();
        let member = member.to_string();
        conn.call(move |conn| {
            conn.execute(
                "INSERT INTO queue_entries (queue_name, member, score) VALUES (?1, ?2, ?3)
                 ON CONFLICT(queue_name, member) DO UPDATE SET score = excluded.score",
                params![queue, member, score],
            )?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn range(&self, queue: &str, count: usize) -> Result<Vec<QueueEntry>, QueueError> {
        let conn = self.connection()?;
        let queue = queue.to_string();
        let limit = i64::try_from(count).unwrap_or(i64::MAX);
        let entries = conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT member, score FROM queue_entries
                     WHERE queue_name = ?1
                     ORDER BY score ASC, member ASC
                     LIMIT ?2",
                )?;
                let rows = stmt
                    .query_map(params![queue, limit], |row| {
                        Ok(QueueEntry::new(row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(entries)
    }

    async fn remove(&self, queue: &str, member: &str) -> Result<bool, QueueError> {
        let conn = self.connection()?;
        let queue = queue.to_string();
        let member = member.to_string();
        let removed = conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM queue_entries WHERE queue_name = ?1 AND member = ?2",
                    params![queue, member],
                )?;
                Ok(n)
            })
            .await?;
        Ok(removed > 0)
    }

    async fn clear(&self, queue: &str) -> Result<usize, QueueError> {
        let conn = self.connection()?;
        let queue = queue.to_string();
        let removed = conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM queue_entries WHERE queue_name = ?1",
                    params![queue],
                )?;
                Ok(n)
            })
            .await?;
        Ok(removed)
    }

    async fn len(&self, queue: &str) -> Result<usize, QueueError> {
        let conn = self.connection()?;
        let queue = queue.to_string();
        let count = conn
            .call(move |conn| {
                let n: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM queue_entries WHERE queue_name = ?1",
                    params![queue],
                    |row| row.get(0),
                )?;
                Ok(n)
            })
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn close(&self) -> Result<(), QueueError> {
        let conn = self
            .conn
            .write()
            .map_err(|_| QueueError::Unavailable("sqlite backend lock poisoned".to_string()))?
            .take();
        if let Some(conn) = conn {
            conn.call(|conn| {
                conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))?;
                Ok(())
            })
            .await?;
            conn.close().await?;
        }
        Ok(())
    }
}
