//! Database layer for Threadmail
//!
//! This crate provides:
//! - `SQLite` storage via `rusqlite`, pooled with `r2d2`
//! - Message and recipient operations with dense recipient positions
//! - Thread-wide bulk actions scoped to one receiver
//! - Inbox and thread listings
//!
//! # Timestamp Convention
//!
//! All timestamps are stored as `i64` (microseconds since Unix epoch).
//! `hidden_at` is `NULL` for visible records.

#![forbid(unsafe_code)]

pub mod compose;
pub mod error;
pub mod inbox;
pub mod models;
pub mod pool;
pub mod propagate;
pub mod queries;
pub mod schema;
pub mod thread;

pub use error::{DbError, DbResult, is_lock_error};
pub use inbox::{
    last_archived_message_per_thread, last_message_per_thread, last_sent_message_per_thread,
    last_unread_message_per_thread, sent_messages, show_thread, unsent_messages,
};
pub use models::*;
pub use pool::{DatabaseLocation, DbConn, DbPool, DbPoolConfig, parse_database_url};
pub use propagate::{
    apply_named_action, apply_to_thread, archive_thread, delete_thread, read_thread, spam_thread,
    unread_thread,
};
pub use queries::{
    add_recipient, archive_recipient, create_message, delete_recipient, deliver_message,
    get_message, get_recipient, hide_recipient, list_recipients, mark_recipient_spam,
    queue_message, recipient_view, unhide_recipient, view_recipient,
};
pub use thread::thread_messages;
