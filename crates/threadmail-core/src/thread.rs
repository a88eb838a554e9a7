//! Thread resolution over in-memory messages.
//!
//! A thread is an anchor message plus every message whose
//! `original_message_id` points at it. Replies always point at the anchor
//! directly, never at another reply, so resolution is one hop.

use std::collections::BTreeSet;

/// A message that can take part in a thread.
pub trait Threaded {
    fn message_id(&self) -> i64;
    fn original_message_id(&self) -> Option<i64>;

    fn is_reply(&self) -> bool {
        self.original_message_id().is_some()
    }
}

/// The id of the thread anchor `message` belongs to.
#[must_use]
pub fn anchor_of<T: Threaded + ?Sized>(message: &T) -> i64 {
    message
        .original_message_id()
        .unwrap_or_else(|| message.message_id())
}

/// Ids of every message in the thread anchored at `anchor_id`.
///
/// Always contains `anchor_id`, even when no message in `messages` matches.
#[must_use]
pub fn thread_message_ids<'a, T, I>(anchor_id: i64, messages: I) -> BTreeSet<i64>
where
    T: Threaded + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut ids: BTreeSet<i64> = messages
        .into_iter()
        .filter(|m| m.original_message_id() == Some(anchor_id))
        .map(Threaded::message_id)
        .collect();
    ids.insert(anchor_id);
    ids
}
