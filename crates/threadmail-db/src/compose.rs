//! Drafts derived from a stored recipient record.
//!
//! Each function loads the receiver's view of the message and hands it to
//! the pure composer in [`threadmail_core::compose`]. The returned draft is
//! not persisted; pass it to [`crate::create_message`] to store it.

use threadmail_core::MessageDraft;

use crate::error::DbResult;
use crate::pool::DbPool;
use crate::queries::recipient_view;

pub fn forward(pool: &DbPool, recipient_id: i64) -> DbResult<MessageDraft> {
    let view = recipient_view(pool, recipient_id)?;
    Ok(threadmail_core::forward(&view))
}

pub fn reply(pool: &DbPool, recipient_id: i64) -> DbResult<MessageDraft> {
    let view = recipient_view(pool, recipient_id)?;
    Ok(threadmail_core::reply(&view))
}

pub fn reply_to_all(pool: &DbPool, recipient_id: i64) -> DbResult<MessageDraft> {
    let view = recipient_view(pool, recipient_id)?;
    Ok(threadmail_core::reply_to_all(&view))
}
