//! Thread-wide actions for one receiver.
//!
//! An action named on a single recipient record is written to every record
//! the same receiver holds across the record's thread, in one `UPDATE`
//! inside one `IMMEDIATE` transaction. The bulk write goes straight to the
//! columns: it does not consult the per-record guards in
//! [`threadmail_core::state`], so `read` lands even on records whose
//! message has not been sent.

use rusqlite::{Connection, params};
use threadmail_core::{Receiver, ThreadAction, now_micros};

use crate::error::DbResult;
use crate::pool::DbPool;
use crate::queries::fetch_recipient;
use crate::thread::{anchor_of, thread_member_ids_sql, thread_message_ids};

/// Apply `action` to every record `recipient_id`'s receiver holds in its
/// thread. Returns the number of records written.
pub fn apply_to_thread(pool: &DbPool, recipient_id: i64, action: ThreadAction) -> DbResult<usize> {
    let mode = pool.thread_propagation();
    pool.write_tx(|conn| {
        let record = fetch_recipient(conn, recipient_id)?;
        let anchor = anchor_of(conn, record.message_id)?;
        let targets = thread_message_ids(conn, anchor)?;

        let is_reply = anchor != record.message_id;
        let effective = mode.effective_action(action, is_reply);
        if effective != action {
            tracing::debug!(
                recipient_id,
                requested = %action,
                effective = %effective,
                mode = mode.as_str(),
                "thread action rewritten for reply record"
            );
        }

        let rows = bulk_update(conn, &record.receiver, anchor, effective, now_micros())?;
        tracing::info!(
            recipient_id,
            receiver = %record.receiver,
            anchor,
            messages = targets.len(),
            action = %effective,
            rows,
            "thread action applied"
        );
        Ok(rows)
    })
}

/// Like [`apply_to_thread`], with the action given by name. An unknown name
/// writes nothing and returns `0`.
pub fn apply_named_action(pool: &DbPool, recipient_id: i64, action: &str) -> DbResult<usize> {
    match ThreadAction::parse(action) {
        Some(action) => apply_to_thread(pool, recipient_id, action),
        None => {
            tracing::warn!(recipient_id, action, "ignoring unknown thread action");
            Ok(0)
        }
    }
}

pub fn archive_thread(pool: &DbPool, recipient_id: i64) -> DbResult<usize> {
    apply_to_thread(pool, recipient_id, ThreadAction::Archive)
}

/// Hide the receiver's records across the thread, stamping `hidden_at`.
pub fn delete_thread(pool: &DbPool, recipient_id: i64) -> DbResult<usize> {
    apply_to_thread(pool, recipient_id, ThreadAction::Delete)
}

pub fn read_thread(pool: &DbPool, recipient_id: i64) -> DbResult<usize> {
    apply_to_thread(pool, recipient_id, ThreadAction::Read)
}

pub fn spam_thread(pool: &DbPool, recipient_id: i64) -> DbResult<usize> {
    apply_to_thread(pool, recipient_id, ThreadAction::Spam)
}

pub fn unread_thread(pool: &DbPool, recipient_id: i64) -> DbResult<usize> {
    apply_to_thread(pool, recipient_id, ThreadAction::Unread)
}

/// One `UPDATE` over the thread. The thread is selected by subquery on the
/// anchor, so the statement binds a fixed number of parameters.
fn bulk_update(
    conn: &Connection,
    receiver: &Receiver,
    anchor: i64,
    action: ThreadAction,
    now: i64,
) -> DbResult<usize> {
    let set_clause = match action {
        ThreadAction::Archive => "label = 'archived'",
        ThreadAction::Spam => "label = 'spam'",
        ThreadAction::Read => "read_state = 'read'",
        ThreadAction::Unread => "read_state = 'unread'",
        ThreadAction::Delete => "hidden_at = ?4",
    };
    let sql = format!(
        "UPDATE message_recipients SET {set_clause} \
         WHERE receiver_type = ?1 AND receiver_id = ?2 AND message_id IN ({})",
        thread_member_ids_sql("?3")
    );
    let rows = if action == ThreadAction::Delete {
        conn.execute(
            &sql,
            params![receiver.receiver_type, receiver.receiver_id, anchor, now],
        )?
    } else {
        conn.execute(
            &sql,
            params![receiver.receiver_type, receiver.receiver_id, anchor],
        )?
    };
    Ok(rows)
}
