//! Message and recipient operations.
//!
//! Pool-level functions open their own connection or transaction. The
//! `pub(crate)` connection-level helpers are what those functions compose
//! inside a transaction; they never acquire a second connection.

use rusqlite::{Connection, OptionalExtension, params};
use threadmail_core::{
    Addressable, MessageDraft, MessageState, MessageView, Receiver, RecipientKind,
    RecipientState, RecipientView, Transition, now_micros,
};

use crate::error::{DbError, DbResult};
use crate::models::{MESSAGE_COLUMNS, MessageRow, RECIPIENT_COLUMNS, RecipientRow};
use crate::pool::DbPool;

/// `ORDER BY` fragment listing `to`, then `cc`, then `bcc`, each by position.
const RECIPIENT_ORDER: &str =
    "CASE r.kind WHEN 'to' THEN 0 WHEN 'cc' THEN 1 ELSE 2 END, r.position, r.id";

// =============================================================================
// Connection-level helpers
// =============================================================================

pub(crate) fn fetch_message(conn: &Connection, message_id: i64) -> DbResult<MessageRow> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages m WHERE m.id = ?1");
    conn.query_row(&sql, [message_id], MessageRow::from_row)
        .optional()?
        .ok_or_else(|| DbError::not_found("Message", message_id.to_string()))
}

pub(crate) fn find_recipient(conn: &Connection, recipient_id: i64) -> DbResult<Option<RecipientRow>> {
    let sql = format!("SELECT {RECIPIENT_COLUMNS} FROM message_recipients r WHERE r.id = ?1");
    Ok(conn
        .query_row(&sql, [recipient_id], RecipientRow::from_row)
        .optional()?)
}

pub(crate) fn fetch_recipient(conn: &Connection, recipient_id: i64) -> DbResult<RecipientRow> {
    find_recipient(conn, recipient_id)?
        .ok_or_else(|| DbError::not_found("Recipient", recipient_id.to_string()))
}

pub(crate) fn recipients_of(
    conn: &Connection,
    message_id: i64,
    kind: Option<RecipientKind>,
) -> DbResult<Vec<RecipientRow>> {
    let rows = match kind {
        Some(kind) => {
            let sql = format!(
                "SELECT {RECIPIENT_COLUMNS} FROM message_recipients r \
                 WHERE r.message_id = ?1 AND r.kind = ?2 ORDER BY {RECIPIENT_ORDER}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![message_id, kind.as_str()], RecipientRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let sql = format!(
                "SELECT {RECIPIENT_COLUMNS} FROM message_recipients r \
                 WHERE r.message_id = ?1 ORDER BY {RECIPIENT_ORDER}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([message_id], RecipientRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

/// Insert a recipient at the next free position of `(message_id, kind)`.
///
/// Must run inside a write transaction so the position read and the insert
/// are not interleaved with another writer.
pub(crate) fn insert_recipient(
    conn: &Connection,
    message_id: i64,
    receiver: &Receiver,
    kind: RecipientKind,
    now: i64,
) -> DbResult<RecipientRow> {
    let position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position), 0) + 1 FROM message_recipients \
         WHERE message_id = ?1 AND kind = ?2",
        params![message_id, kind.as_str()],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO message_recipients \
         (message_id, receiver_type, receiver_id, kind, position, created_ts) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            message_id,
            receiver.receiver_type,
            receiver.receiver_id,
            kind.as_str(),
            position,
            now
        ],
    )?;
    fetch_recipient(conn, conn.last_insert_rowid())
}

fn write_recipient_state(conn: &Connection, record: &RecipientRow) -> DbResult<()> {
    conn.execute(
        "UPDATE message_recipients SET read_state = ?1, hidden_at = ?2, label = ?3 WHERE id = ?4",
        params![
            record.read_state.as_str(),
            record.visibility.hidden_at(),
            record.label.as_str(),
            record.id
        ],
    )?;
    Ok(())
}

fn receivers(rows: &[RecipientRow], kind: RecipientKind) -> Vec<Receiver> {
    rows.iter()
        .filter(|r| r.kind == kind)
        .map(|r| r.receiver.clone())
        .collect()
}

// =============================================================================
// Messages
// =============================================================================

/// Store a draft as an `unsent` message with its recipients.
///
/// A referenced anchor must exist and must itself be a thread root.
pub fn create_message(pool: &DbPool, draft: &MessageDraft) -> DbResult<MessageRow> {
    let message = pool.write_tx(|conn| {
        if let Some(anchor_id) = draft.original_message_id {
            let anchor = fetch_message(conn, anchor_id)?;
            if let Some(root) = anchor.original_message_id {
                return Err(DbError::invalid(
                    "original_message_id",
                    format!("message {anchor_id} is a reply; anchor replies at {root}"),
                ));
            }
        }

        let now = now_micros();
        conn.execute(
            "INSERT INTO messages \
             (sender_type, sender_id, subject, body, state, original_message_id, created_ts, updated_ts) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                draft.sender.receiver_type,
                draft.sender.receiver_id,
                draft.subject,
                draft.body,
                MessageState::Unsent.as_str(),
                draft.original_message_id,
                now
            ],
        )?;
        let message_id = conn.last_insert_rowid();
        for (kind, receiver) in draft.recipients() {
            insert_recipient(conn, message_id, receiver, kind, now)?;
        }
        fetch_message(conn, message_id)
    })?;

    tracing::debug!(
        message_id = message.id,
        sender = %message.sender,
        original_message_id = ?message.original_message_id,
        recipients = draft.recipients().count(),
        "message created"
    );
    Ok(message)
}

pub fn get_message(pool: &DbPool, message_id: i64) -> DbResult<MessageRow> {
    pool.read(|conn| fetch_message(conn, message_id))
}

/// `unsent -> queued`.
pub fn queue_message(pool: &DbPool, message_id: i64) -> DbResult<MessageRow> {
    advance_message(pool, message_id, "queue", MessageState::queue)
}

/// `unsent | queued -> sent`.
pub fn deliver_message(pool: &DbPool, message_id: i64) -> DbResult<MessageRow> {
    advance_message(pool, message_id, "deliver", MessageState::deliver)
}

fn advance_message(
    pool: &DbPool,
    message_id: i64,
    event: &'static str,
    next: impl FnOnce(MessageState) -> threadmail_core::Result<MessageState>,
) -> DbResult<MessageRow> {
    let message = pool.write_tx(|conn| {
        let message = fetch_message(conn, message_id)?;
        let state = next(message.state)?;
        conn.execute(
            "UPDATE messages SET state = ?1, updated_ts = ?2 WHERE id = ?3",
            params![state.as_str(), now_micros(), message_id],
        )?;
        fetch_message(conn, message_id)
    })?;
    tracing::debug!(message_id, event, state = %message.state, "message state advanced");
    Ok(message)
}

// =============================================================================
// Recipients
// =============================================================================

/// Address `message_id` to `receiver`, appending at the end of `kind`.
pub fn add_recipient(
    pool: &DbPool,
    message_id: i64,
    receiver: &impl Addressable,
    kind: RecipientKind,
) -> DbResult<RecipientRow> {
    let receiver = receiver.to_receiver();
    let row = pool.write_tx(|conn| {
        fetch_message(conn, message_id)?;
        insert_recipient(conn, message_id, &receiver, kind, now_micros())
    })?;
    tracing::debug!(
        recipient_id = row.id,
        message_id,
        kind = %kind,
        position = row.position,
        "recipient added"
    );
    Ok(row)
}

/// Delete one recipient and close the gap it leaves in its kind's positions.
pub fn delete_recipient(pool: &DbPool, recipient_id: i64) -> DbResult<()> {
    let row = pool.write_tx(|conn| {
        let row = fetch_recipient(conn, recipient_id)?;
        conn.execute("DELETE FROM message_recipients WHERE id = ?1", [recipient_id])?;
        conn.execute(
            "UPDATE message_recipients SET position = position - 1 \
             WHERE message_id = ?1 AND kind = ?2 AND position > ?3",
            params![row.message_id, row.kind.as_str(), row.position],
        )?;
        Ok(row)
    })?;
    tracing::debug!(
        recipient_id,
        message_id = row.message_id,
        kind = %row.kind,
        position = row.position,
        "recipient deleted"
    );
    Ok(())
}

pub fn get_recipient(pool: &DbPool, recipient_id: i64) -> DbResult<RecipientRow> {
    pool.read(|conn| fetch_recipient(conn, recipient_id))
}

/// Recipients of a message ordered `to`, `cc`, `bcc` and then by position.
pub fn list_recipients(
    pool: &DbPool,
    message_id: i64,
    kind: Option<RecipientKind>,
) -> DbResult<Vec<RecipientRow>> {
    pool.read(|conn| recipients_of(conn, message_id, kind))
}

/// Load one receiver's view of a message for composing.
pub fn recipient_view(pool: &DbPool, recipient_id: i64) -> DbResult<RecipientView> {
    pool.read(|conn| {
        let record = fetch_recipient(conn, recipient_id)?;
        let message = fetch_message(conn, record.message_id)?;
        let rows = recipients_of(conn, message.id, None)?;
        Ok(RecipientView {
            recipient_id: record.id,
            receiver: record.receiver,
            kind: record.kind,
            message: MessageView {
                id: message.id,
                subject: message.subject,
                body: message.body,
                sender: message.sender,
                state: message.state,
                original_message_id: message.original_message_id,
                to: receivers(&rows, RecipientKind::To),
                cc: receivers(&rows, RecipientKind::Cc),
                bcc: receivers(&rows, RecipientKind::Bcc),
            },
        })
    })
}

// =============================================================================
// Single-record transitions
// =============================================================================

/// Mark one record read. Denied (no change) while its message is not sent.
pub fn view_recipient(pool: &DbPool, recipient_id: i64) -> DbResult<Transition> {
    transition_recipient(pool, recipient_id, "view", |state, message| {
        state.view(message)
    })
}

pub fn hide_recipient(pool: &DbPool, recipient_id: i64) -> DbResult<Transition> {
    transition_recipient(pool, recipient_id, "hide", |state, _| {
        state.hide(now_micros())
    })
}

pub fn unhide_recipient(pool: &DbPool, recipient_id: i64) -> DbResult<Transition> {
    transition_recipient(pool, recipient_id, "unhide", |state, _| state.unhide())
}

pub fn archive_recipient(pool: &DbPool, recipient_id: i64) -> DbResult<Transition> {
    transition_recipient(pool, recipient_id, "archive", |state, _| state.archive())
}

pub fn mark_recipient_spam(pool: &DbPool, recipient_id: i64) -> DbResult<Transition> {
    transition_recipient(pool, recipient_id, "mark_spam", |state, _| {
        state.mark_spam()
    })
}

fn transition_recipient(
    pool: &DbPool,
    recipient_id: i64,
    event: &'static str,
    apply: impl FnOnce(&mut RecipientState, MessageState) -> Transition,
) -> DbResult<Transition> {
    let (outcome, message_state) = pool.write_tx(|conn| {
        let mut record = fetch_recipient(conn, recipient_id)?;
        let message = fetch_message(conn, record.message_id)?;
        let mut state = record.state();
        let outcome = apply(&mut state, message.state);
        if outcome.changed() {
            record.set_state(state);
            write_recipient_state(conn, &record)?;
        }
        Ok((outcome, message.state))
    })?;

    if outcome == Transition::Denied {
        tracing::warn!(
            recipient_id,
            event,
            message_state = %message_state,
            "recipient transition denied"
        );
    } else {
        tracing::debug!(recipient_id, event, ?outcome, "recipient transition");
    }
    Ok(outcome)
}
