//! Thread resolution against the store.

use std::collections::BTreeSet;

use rusqlite::Connection;

use crate::error::DbResult;
use crate::models::{MESSAGE_COLUMNS, MessageRow};
use crate::pool::DbPool;
use crate::queries::fetch_message;

/// Anchor id of the thread `message_id` belongs to.
pub fn anchor_of(conn: &Connection, message_id: i64) -> DbResult<i64> {
    let message = fetch_message(conn, message_id)?;
    Ok(threadmail_core::anchor_of(&message))
}

/// The anchor plus every message that names it as `original_message_id`.
pub fn thread_message_ids(conn: &Connection, anchor_id: i64) -> DbResult<BTreeSet<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM messages WHERE original_message_id = ?1")?;
    let mut ids = stmt
        .query_map([anchor_id], |row| row.get::<_, i64>(0))?
        .collect::<Result<BTreeSet<_>, _>>()?;
    ids.insert(anchor_id);
    Ok(ids)
}

/// `SELECT` of every message id in the thread anchored at the SQL parameter
/// `anchor_param` (for example `?3`). Binds one parameter whatever the
/// thread size, so it can sit inside `IN (...)`.
pub(crate) fn thread_member_ids_sql(anchor_param: &str) -> String {
    format!(
        "SELECT id FROM messages WHERE id = {anchor_param} OR original_message_id = {anchor_param}"
    )
}

/// Every message in the thread containing `message_id`, oldest first.
pub fn thread_messages(pool: &DbPool, message_id: i64) -> DbResult<Vec<MessageRow>> {
    pool.read(|conn| {
        let anchor = anchor_of(conn, message_id)?;
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id IN ({}) ORDER BY m.id",
            thread_member_ids_sql("?1")
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([anchor], MessageRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// `?, ?, ...` with `count` placeholders, for `IN (...)` lists.
pub(crate) fn placeholders(count: usize) -> String {
    std::iter::repeat_n("?", count)
        .collect::<Vec<_>>()
        .join(", ")
}
