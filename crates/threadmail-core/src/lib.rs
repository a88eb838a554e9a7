//! Core types for Threadmail: per-recipient message state.
//!
//! Every logical message fans out into one recipient record per addressee
//! (`to`, `cc`, `bcc`). Each record tracks its own read state, visibility
//! and label. Messages group into threads through an anchor (the original
//! message).
//!
//! This crate is storage-free. `threadmail-db` persists these types and
//! runs the bulk thread updates.

#![forbid(unsafe_code)]

pub mod compose;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod thread;
pub mod timestamps;

pub use compose::{MessageDraft, MessageView, RecipientView, forward, reply, reply_to_all};
pub use config::Config;
pub use error::{Error, Result};
pub use models::{
    Addressable, LabelFilter, MessageState, PropagationMode, Receiver, RecipientKind,
    ThreadAction,
};
pub use state::{Label, ReadState, RecipientState, Transition, Visibility};
pub use thread::{Threaded, anchor_of, thread_message_ids};
pub use timestamps::{micros_to_naive, naive_to_micros, now_micros};
