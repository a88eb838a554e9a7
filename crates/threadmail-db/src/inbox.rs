//! Mailbox listings.
//!
//! Per-thread listings group by `COALESCE(original_message_id, id)` and keep
//! the highest message id in each group. Receiver listings only consider
//! visible records of `sent` messages.

use rusqlite::types::Value;
use rusqlite::{Connection, params, params_from_iter};
use threadmail_core::{Addressable, LabelFilter, MessageState};

use crate::error::DbResult;
use crate::models::{MESSAGE_COLUMNS, MessageRow, RECIPIENT_COLUMNS, RecipientRow};
use crate::pool::DbPool;
use crate::queries::find_recipient;
use crate::thread::{anchor_of, placeholders, thread_member_ids_sql};

// =============================================================================
// Sender listings
// =============================================================================

/// Drafts of `sender`, newest first.
pub fn unsent_messages(pool: &DbPool, sender: &impl Addressable) -> DbResult<Vec<MessageRow>> {
    messages_in_states(pool, sender, &[MessageState::Unsent])
}

/// Messages `sender` has queued or sent, newest first.
pub fn sent_messages(pool: &DbPool, sender: &impl Addressable) -> DbResult<Vec<MessageRow>> {
    let states: Vec<_> = MessageState::ALL
        .into_iter()
        .filter(|s| s.is_outgoing())
        .collect();
    messages_in_states(pool, sender, &states)
}

/// Latest `sent` message of each thread `sender` has sent into.
pub fn last_sent_message_per_thread(
    pool: &DbPool,
    sender: &impl Addressable,
) -> DbResult<Vec<MessageRow>> {
    let sql = format!(
        "WITH candidates AS ( \
             SELECT m.id AS mid, COALESCE(m.original_message_id, m.id) AS anchor \
             FROM messages m \
             WHERE m.sender_type = ?1 AND m.sender_id = ?2 AND m.state = 'sent' \
         ), latest AS ( \
             SELECT MAX(mid) AS mid FROM candidates GROUP BY anchor \
         ) \
         SELECT {MESSAGE_COLUMNS} FROM latest l JOIN messages m ON m.id = l.mid \
         ORDER BY m.id DESC"
    );
    pool.read(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![sender.receiver_type(), sender.receiver_id()],
                MessageRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

fn messages_in_states(
    pool: &DbPool,
    sender: &impl Addressable,
    states: &[MessageState],
) -> DbResult<Vec<MessageRow>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages m \
         WHERE m.sender_type = ? AND m.sender_id = ? AND m.state IN ({}) \
         ORDER BY m.id DESC",
        placeholders(states.len())
    );
    let mut values = vec![
        Value::Text(sender.receiver_type().to_string()),
        Value::Integer(sender.receiver_id()),
    ];
    values.extend(states.iter().map(|s| Value::Text(s.as_str().to_string())));
    pool.read(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), MessageRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

// =============================================================================
// Receiver listings
// =============================================================================

/// The receiver's latest visible record in each thread, whatever its label.
pub fn last_message_per_thread(
    pool: &DbPool,
    receiver: &impl Addressable,
) -> DbResult<Vec<RecipientRow>> {
    last_record_per_thread(pool, receiver, "")
}

/// Latest unread record in each thread that has one.
pub fn last_unread_message_per_thread(
    pool: &DbPool,
    receiver: &impl Addressable,
) -> DbResult<Vec<RecipientRow>> {
    last_record_per_thread(pool, receiver, "AND r.read_state = 'unread'")
}

/// Latest archived record in each thread that has one.
pub fn last_archived_message_per_thread(
    pool: &DbPool,
    receiver: &impl Addressable,
) -> DbResult<Vec<RecipientRow>> {
    last_record_per_thread(pool, receiver, "AND r.label = 'archived'")
}

/// `filter` is a fixed SQL fragment over `r`; never caller input.
fn last_record_per_thread(
    pool: &DbPool,
    receiver: &impl Addressable,
    filter: &str,
) -> DbResult<Vec<RecipientRow>> {
    let sql = format!(
        "WITH candidates AS ( \
             SELECT r.id AS rid, m.id AS mid, COALESCE(m.original_message_id, m.id) AS anchor \
             FROM message_recipients r JOIN messages m ON m.id = r.message_id \
             WHERE r.receiver_type = ?1 AND r.receiver_id = ?2 \
               AND m.state = 'sent' AND r.hidden_at IS NULL {filter} \
         ), latest AS ( \
             SELECT anchor, MAX(mid) AS mid FROM candidates GROUP BY anchor \
         ), picked AS ( \
             SELECT MIN(c.rid) AS rid, c.mid AS mid \
             FROM candidates c JOIN latest l ON l.anchor = c.anchor AND l.mid = c.mid \
             GROUP BY c.anchor, c.mid \
         ) \
         SELECT {RECIPIENT_COLUMNS} FROM picked p JOIN message_recipients r ON r.id = p.rid \
         ORDER BY p.mid DESC"
    );
    pool.read(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![receiver.receiver_type(), receiver.receiver_id()],
                RecipientRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

// =============================================================================
// Thread view
// =============================================================================

/// Records of the same receiver across `recipient_id`'s thread, filtered by
/// label and ordered by message id. Hidden records (non-null `hidden_at`)
/// are left out. Empty for an unknown id.
pub fn show_thread(
    pool: &DbPool,
    recipient_id: i64,
    filter: LabelFilter,
) -> DbResult<Vec<RecipientRow>> {
    pool.read(|conn| {
        let Some(record) = find_recipient(conn, recipient_id)? else {
            return Ok(Vec::new());
        };
        let anchor = anchor_of(conn, record.message_id)?;
        thread_records(conn, &record.receiver, anchor, filter)
    })
}

fn thread_records(
    conn: &Connection,
    receiver: &impl Addressable,
    anchor: i64,
    filter: LabelFilter,
) -> DbResult<Vec<RecipientRow>> {
    let sql = format!(
        "SELECT {RECIPIENT_COLUMNS} FROM message_recipients r \
         WHERE r.receiver_type = ?1 AND r.receiver_id = ?2 AND r.label = ?3 \
           AND r.hidden_at IS NULL AND r.message_id IN ({}) \
         ORDER BY r.message_id, r.id",
        thread_member_ids_sql("?4")
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            params![
                receiver.receiver_type(),
                receiver.receiver_id(),
                filter.label().as_str(),
                anchor
            ],
            RecipientRow::from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
