//! Row models for the `messages` and `message_recipients` tables.
//!
//! Enum columns are stored as lowercase text and parsed on read; visibility
//! is the nullable `hidden_at` column. All timestamps are microseconds since
//! Unix epoch.

use chrono::NaiveDateTime;
use rusqlite::Row;
use rusqlite::types::Type;
use serde::{Deserialize, Serialize};
use threadmail_core::{
    Label, MessageState, ReadState, Receiver, RecipientKind, RecipientState, Threaded, Visibility,
    micros_to_naive,
};

// =============================================================================
// Message
// =============================================================================

pub(crate) const MESSAGE_COLUMNS: &str = "m.id, m.sender_type, m.sender_id, m.subject, m.body, \
     m.state, m.original_message_id, m.created_ts, m.updated_ts";

/// A stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: i64,
    pub sender: Receiver,
    pub subject: String,
    pub body: String,
    pub state: MessageState,
    /// Thread anchor; `None` when this message is the anchor.
    pub original_message_id: Option<i64>,
    pub created_ts: i64,
    pub updated_ts: i64,
}

impl MessageRow {
    /// Map a row selected with [`MESSAGE_COLUMNS`].
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            sender: Receiver::new(row.get::<_, String>(1)?, row.get(2)?),
            subject: row.get(3)?,
            body: row.get(4)?,
            state: parse_column(row, 5, MessageState::parse)?,
            original_message_id: row.get(6)?,
            created_ts: row.get(7)?,
            updated_ts: row.get(8)?,
        })
    }

    #[must_use]
    pub fn created_at_naive(&self) -> NaiveDateTime {
        micros_to_naive(self.created_ts)
    }
}

impl Threaded for MessageRow {
    fn message_id(&self) -> i64 {
        self.id
    }

    fn original_message_id(&self) -> Option<i64> {
        self.original_message_id
    }
}

// =============================================================================
// Recipient
// =============================================================================

pub(crate) const RECIPIENT_COLUMNS: &str = "r.id, r.message_id, r.receiver_type, r.receiver_id, \
     r.kind, r.position, r.read_state, r.hidden_at, r.label, r.created_ts";

/// One receiver's record of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientRow {
    pub id: i64,
    pub message_id: i64,
    pub receiver: Receiver,
    pub kind: RecipientKind,
    /// 1-based, dense within `(message_id, kind)`.
    pub position: i64,
    pub read_state: ReadState,
    pub visibility: Visibility,
    pub label: Label,
    pub created_ts: i64,
}

impl RecipientRow {
    /// Map a row selected with [`RECIPIENT_COLUMNS`].
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            message_id: row.get(1)?,
            receiver: Receiver::new(row.get::<_, String>(2)?, row.get(3)?),
            kind: parse_column(row, 4, RecipientKind::parse)?,
            position: row.get(5)?,
            read_state: parse_column(row, 6, ReadState::parse)?,
            visibility: Visibility::from_hidden_at(row.get(7)?),
            label: parse_column(row, 8, Label::parse)?,
            created_ts: row.get(9)?,
        })
    }

    /// The three state fields as one value.
    #[must_use]
    pub const fn state(&self) -> RecipientState {
        RecipientState {
            read_state: self.read_state,
            visibility: self.visibility,
            label: self.label,
        }
    }

    pub const fn set_state(&mut self, state: RecipientState) {
        self.read_state = state.read_state;
        self.visibility = state.visibility;
        self.label = state.label;
    }

    #[must_use]
    pub const fn is_hidden(&self) -> bool {
        self.visibility.is_hidden()
    }

    #[must_use]
    pub fn hidden_at_naive(&self) -> Option<NaiveDateTime> {
        self.visibility.hidden_at().map(micros_to_naive)
    }
}

fn parse_column<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl FnOnce(&str) -> threadmail_core::Result<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
