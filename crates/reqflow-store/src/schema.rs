//! Database schema management.

use rusqlite::Connection;
use tokio_rusqlite::Error;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
-- One row per data request, keyed by request id
CREATE TABLE IF NOT EXISTS requests (
    request_id TEXT PRIMARY KEY,
    identifier TEXT NOT NULL,
    request_name TEXT NOT NULL,
    status TEXT NOT NULL,
    error_message TEXT,
    poll_count INTEGER NOT NULL DEFAULT 0,
    record TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Content persisted by response handlers
CREATE TABLE IF NOT EXISTS responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id TEXT NOT NULL,
    identifier TEXT NOT NULL,
    kind TEXT NOT NULL,
    response_key TEXT,
    content_type TEXT NOT NULL,
    content TEXT NOT NULL,
    received_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_requests_status ON requests(status, created_at);
CREATE INDEX IF NOT EXISTS idx_requests_updated ON requests(updated_at);
CREATE INDEX IF NOT EXISTS idx_responses_request ON responses(request_id);
"#;
