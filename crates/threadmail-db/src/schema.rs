//! Database schema creation
//!
//! Creates the message and recipient tables and their indexes. The schema
//! version is tracked in `PRAGMA user_version`.

use rusqlite::Connection;

use crate::error::{DbError, DbResult};

/// Current schema version stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// SQL statements for creating the database schema
pub const CREATE_TABLES_SQL: &str = r"
-- Messages table
CREATE TABLE IF NOT EXISTS messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sender_type TEXT NOT NULL,
    sender_id INTEGER NOT NULL,
    subject TEXT NOT NULL DEFAULT '',
    body TEXT NOT NULL DEFAULT '',
    state TEXT NOT NULL DEFAULT 'unsent' CHECK (state IN ('unsent', 'queued', 'sent')),
    original_message_id INTEGER REFERENCES messages(id),
    created_ts INTEGER NOT NULL,
    updated_ts INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_original ON messages(original_message_id);
CREATE INDEX IF NOT EXISTS idx_messages_sender_state ON messages(sender_type, sender_id, state);

-- Message recipients: one row per (message, receiver, kind)
CREATE TABLE IF NOT EXISTS message_recipients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id INTEGER NOT NULL REFERENCES messages(id),
    receiver_type TEXT NOT NULL,
    receiver_id INTEGER NOT NULL,
    kind TEXT NOT NULL DEFAULT 'to' CHECK (kind IN ('to', 'cc', 'bcc')),
    position INTEGER NOT NULL,
    read_state TEXT NOT NULL DEFAULT 'unread' CHECK (read_state IN ('unread', 'read')),
    hidden_at INTEGER,
    label TEXT NOT NULL DEFAULT 'none' CHECK (label IN ('none', 'archived', 'spam')),
    created_ts INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_message_recipients_message_kind ON message_recipients(message_id, kind, position);
CREATE INDEX IF NOT EXISTS idx_message_recipients_receiver ON message_recipients(receiver_type, receiver_id, message_id);
";

/// Create tables if needed and stamp the schema version.
///
/// Refuses to run against a database written by a newer schema.
pub fn init_schema(conn: &Connection) -> DbResult<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(DbError::Schema(format!(
            "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
        )));
    }
    conn.execute_batch(CREATE_TABLES_SQL)?;
    if version < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        tracing::debug!(from = version, to = SCHEMA_VERSION, "schema initialized");
    }
    Ok(())
}
