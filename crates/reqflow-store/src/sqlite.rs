//! SQLite lifecycle store.

use std::path::Path;
use std::sync::RwLock;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;
use tracing::debug;

use reqflow_queue::RequestRecord;

use crate::error::StoreError;
use crate::model::{ResponseKind, ResponseRecord, StoredRequest};
use crate::schema::init_schema;
use crate::status::RequestStatus;
use crate::store::LifecycleStore;

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;

const BUSY_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Raw `requests` row: status, error_message, poll_count, record, created_at, updated_at.
type RequestRow = (String, Option<String>, u32, String, String, String);

/// Raw `responses` row as read from the database.
type ResponseRow = (String, String, String, Option<String>, String, String, String);

/// SQLite-based lifecycle store.
pub struct SqliteLifecycleStore {
    /// Taken on close, which releases the database handle.
    conn: RwLock<Option<Connection>>,
}

impl SqliteLifecycleStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    /// Open or create a file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening lifecycle store at {}", path.display());
        let conn = Connection::open(path).await?;
        conn.call(|conn| {
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            Ok(())
        })
        .await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            init_schema(conn)
        })
        .await?;
        Ok(Self {
            conn: RwLock::new(Some(conn)),
        })
    }

    /// Handle on the open connection, or `Unavailable` once closed.
    fn connection(&self) -> Result<Connection, StoreError> {
        self.conn
            .read()
            .map_err(|_| StoreError::Unavailable("sqlite store lock poisoned".to_string()))?
            .clone()
            .ok_or_else(|| StoreError::Unavailable("sqlite store is closed".to_string()))
    }
}

fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("bad timestamp {:?}: {}", s, e)))
}

fn stored_from_row(row: RequestRow) -> Result<StoredRequest, StoreError> {
    let (status, error_message, poll_count, record, created_at, updated_at) = row;
    Ok(StoredRequest {
        record: serde_json::from_str(&record)?,
        status: status.parse()?,
        error_message,
        poll_count,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn response_from_row(row: ResponseRow) -> Result<ResponseRecord, StoreError> {
    let (request_id, identifier, kind, key, content_type, content, received_at) = row;
    Ok(ResponseRecord {
        kind: ResponseKind::parse(&kind)
            .ok_or_else(|| StoreError::Query(format!("unknown response kind {}", kind)))?,
        request_id,
        identifier,
        key,
        content_type,
        content,
        received_at: parse_timestamp(&received_at)?,
    })
}

#[async_trait]
impl LifecycleStore for SqliteLifecycleStore {
    fn id(&self) -> &str {
        "sqlite"
    }

    async fn track(&self, record: &RequestRecord) -> Result<(), StoreError> {
        let conn = self.connection()?;
        let wire = serde_json::to_string(record)?;
        let request_id = record.request_id.clone();
        let identifier = record.identifier.clone();
        let request_name = record.request_name.clone();
        let now = timestamp(Utc::now());
        conn.call(move |conn| {
            conn.execute(
                "INSERT INTO requests
                    (request_id, identifier, request_name, status, poll_count, record, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?6)
                 ON CONFLICT(request_id) DO UPDATE SET
                    record = excluded.record,
                    updated_at = excluded.updated_at",
                params![
                    request_id,
                    identifier,
                    request_name,
                    RequestStatus::Queued.as_str(),
                    wire,
                    now
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn set_status(&self, request_id: &str, status: RequestStatus) -> Result<(), StoreError> {
        let conn = self.connection()?;
        let id = request_id.to_string();
        let now = timestamp(Utc::now());
        let updated = conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE requests SET status = ?1, updated_at = ?2 WHERE request_id = ?3",
                    params![status.as_str(), now, id],
                )?;
                Ok(n)
            })
            .await?;
        if updated == 0 {
            debug!("set_status({}) ignored for unknown request {}", status, request_id);
        }
        Ok(())
    }

    async fn record_error(&self, request_id: &str, message: &str) -> Result<(), StoreError> {
        let conn = self.connection()?;
        let id = request_id.to_string();
        let message = message.to_string();
        let now = timestamp(Utc::now());
        let updated = conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE requests SET error_message = ?1, updated_at = ?2 WHERE request_id = ?3",
                    params![message, now, id],
                )?;
                Ok(n)
            })
            .await?;
        if updated == 0 {
            debug!("record_error ignored for unknown request {}", request_id);
        }
        Ok(())
    }

    async fn list_by_status(&self, status: RequestStatus) -> Result<Vec<RequestRecord>, StoreError> {
        let conn = self.connection()?;
        let rows = conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT record FROM requests
                     WHERE status = ?1
                     ORDER BY created_at ASC, request_id ASC",
                )?;
                let rows = stmt
                    .query_map(params![status.as_str()], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.iter()
            .map(|raw| serde_json::from_str(raw).map_err(StoreError::from))
            .collect()
    }

    async fn get(&self, request_id: &str) -> Result<Option<StoredRequest>, StoreError> {
        let conn = self.connection()?;
        let id = request_id.to_string();
        let row: Option<RequestRow> = conn
            .call(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT status, error_message, poll_count, record, created_at, updated_at
                         FROM requests WHERE request_id = ?1",
                        params![id],
                        |row| {
                            Ok((
                                row.get(0)?,
                                row.get(1)?,
                                row.get(2)?,
                                row.get(3)?,
                                row.get(4)?,
                                row.get(5)?,
                            ))
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await?;
        row.map(stored_from_row).transpose()
    }

    async fn record_poll(&self, request_id: &str) -> Result<u32, StoreError> {
        let conn = self.connection()?;
        let id = request_id.to_string();
        let now = timestamp(Utc::now());
        let count = conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "UPDATE requests SET poll_count = poll_count + 1, updated_at = ?1
                     WHERE request_id = ?2",
                    params![now, id],
                )?;
                let count: Option<u32> = tx
                    .query_row(
                        "SELECT poll_count FROM requests WHERE request_id = ?1",
                        params![id],
                        |row| row.get(0),
                    )
                    .optional()?;
                tx.commit()?;
                Ok(count.unwrap_or(0))
            })
            .await?;
        Ok(count)
    }

    async fn store_response(&self, response: ResponseRecord) -> Result<(), StoreError> {
        let conn = self.connection()?;
        let received_at = timestamp(response.received_at);
        conn.call(move |conn| {
            conn.execute(
                "INSERT INTO responses
                    (request_id, identifier, kind, response_key, content_type, content, received_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    response.request_id,
                    response.identifier,
                    response.kind.as_str(),
                    response.key,
                    response.content_type,
                    response.content,
                    received_at
                ],
            )?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn responses(&self, request_id: &str) -> Result<Vec<ResponseRecord>, StoreError> {
        let conn = self.connection()?;
        let id = request_id.to_string();
        let rows: Vec<ResponseRow> = conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT request_id, identifier, kind, response_key, content_type, content, received_at
                     FROM responses WHERE request_id = ?1 ORDER BY id ASC",
                )?;
                let rows = stmt
                    .query_map(params![id], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        rows.into_iter().map(response_from_row).collect()
    }

    async fn purge_older_than(&self, days: u32) -> Result<usize, StoreError> {
        let conn = self.connection()?;
        let cutoff = timestamp(Utc::now() - Duration::days(i64::from(days)));
        let terminal = [
            RequestStatus::Completed.as_str(),
            RequestStatus::Error.as_str(),
            RequestStatus::Failed.as_str(),
        ];
        let purged = conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "DELETE FROM responses WHERE request_id IN (
                        SELECT request_id FROM requests
                        WHERE status IN (?1, ?2, ?3) AND updated_at < ?4
                     )",
                    params![terminal[0], terminal[1], terminal[2], cutoff],
                )?;
                let n = tx.execute(
                    "DELETE FROM requests WHERE status IN (?1, ?2, ?3) AND updated_at < ?4",
                    params![terminal[0], terminal[1], terminal[2], cutoff],
                )?;
                tx.commit()?;
                Ok(n)
            })
            .await?;
        debug!("Purged {} requests older than {} days", purged, days);
        Ok(purged)
    }

    async fn close(&self) -> Result<(), StoreError> {
        let conn = self
            .conn
            .write()
            .map_err(|_| StoreError::Unavailable("sqlite store lock poisoned".to_string()))?
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
