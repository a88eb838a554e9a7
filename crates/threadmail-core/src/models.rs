//! Domain values shared by the store and the composer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::Label;

// =============================================================================
// MessageState
// =============================================================================

/// Lifecycle of a message, owned by the message rather than its recipients.
///
/// `unsent -> queued -> sent`, with `deliver` also allowed straight from
/// `unsent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageState {
    #[default]
    Unsent,
    Queued,
    Sent,
}

impl MessageState {
    pub const ALL: [Self; 3] = [Self::Unsent, Self::Queued, Self::Sent];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unsent => "unsent",
            Self::Queued => "queued",
            Self::Sent => "sent",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unsent" => Ok(Self::Unsent),
            "queued" => Ok(Self::Queued),
            "sent" => Ok(Self::Sent),
            _ => Err(Error::unknown("message state", value)),
        }
    }

    /// `unsent -> queued`.
    pub fn queue(self) -> Result<Self> {
        match self {
            Self::Unsent => Ok(Self::Queued),
            other => Err(other.invalid_transition(Self::Queued)),
        }
    }

    /// `unsent | queued -> sent`.
    pub fn deliver(self) -> Result<Self> {
        match self {
            Self::Unsent | Self::Queued => Ok(Self::Sent),
            Self::Sent => Err(self.invalid_transition(Self::Sent)),
        }
    }

    /// Queued and sent messages are both "sent" from the sender's outbox view.
    #[must_use]
    pub const fn is_outgoing(self) -> bool {
        matches!(self, Self::Queued | Self::Sent)
    }

    fn invalid_transition(self, to: Self) -> Error {
        Error::InvalidTransition {
            entity: "message",
            from: self.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// RecipientKind
// =============================================================================

/// How a receiver is addressed on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientKind {
    To,
    Cc,
    Bcc,
}

impl RecipientKind {
    pub const ALL: [Self; 3] = [Self::To, Self::Cc, Self::Bcc];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::To => "to",
            Self::Cc => "cc",
            Self::Bcc => "bcc",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "to" => Ok(Self::To),
            "cc" => Ok(Self::Cc),
            "bcc" => Ok(Self::Bcc),
            _ => Err(Error::unknown("recipient kind", value)),
        }
    }
}

impl fmt::Display for RecipientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Receiver
// =============================================================================

/// Tagged reference to whatever entity receives (or sends) a message.
///
/// The store keeps the `(receiver_type, receiver_id)` pair explicitly; two
/// receivers are the same only when both halves match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Receiver {
    pub receiver_type: String,
    pub receiver_id: i64,
}

impl Receiver {
    #[must_use]
    pub fn new(receiver_type: impl Into<String>, receiver_id: i64) -> Self {
        Self {
            receiver_type: receiver_type.into(),
            receiver_id,
        }
    }
}

impl fmt::Display for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.receiver_type, self.receiver_id)
    }
}

/// Anything that can be addressed by a message.
///
/// Owning entities (users, groups, service accounts) implement this to hand
/// the store a [`Receiver`] without the store knowing their concrete type.
pub trait Addressable {
    fn receiver_type(&self) -> &str;
    fn receiver_id(&self) -> i64;

    fn to_receiver(&self) -> Receiver {
        Receiver::new(self.receiver_type(), self.receiver_id())
    }
}

impl Addressable for Receiver {
    fn receiver_type(&self) -> &str {
        &self.receiver_type
    }

    fn receiver_id(&self) -> i64 {
        self.receiver_id
    }

    fn to_receiver(&self) -> Receiver {
        self.clone()
    }
}

// =============================================================================
// ThreadAction
// =============================================================================

/// A recipient-scoped change applied across a whole thread in one bulk write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadAction {
    Archive,
    Delete,
    Read,
    Spam,
    Unread,
}

impl ThreadAction {
    pub const ALL: [Self; 5] = [
        Self::Archive,
        Self::Delete,
        Self::Read,
        Self::Spam,
        Self::Unread,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Delete => "delete",
            Self::Read => "read",
            Self::Spam => "spam",
            Self::Unread => "unread",
        }
    }

    /// `None` for anything outside the five known actions.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "archive" => Some(Self::Archive),
            "delete" => Some(Self::Delete),
            "read" => Some(Self::Read),
            "spam" => Some(Self::Spam),
            "unread" => Some(Self::Unread),
            _ => None,
        }
    }
}

impl fmt::Display for ThreadAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// LabelFilter
// =============================================================================

/// Label selector for thread views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelFilter {
    Archived,
    Spam,
    #[default]
    Unlabeled,
}

impl LabelFilter {
    /// The label a record must carry to match.
    #[must_use]
    pub const fn label(self) -> Label {
        match self {
            Self::Archived => Label::Archived,
            Self::Spam => Label::Spam,
            Self::Unlabeled => Label::None,
        }
    }
}

// =============================================================================
// PropagationMode
// =============================================================================

/// How a bulk thread action treats records whose message is a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationMode {
    /// Apply the requested action everywhere.
    #[default]
    Faithful,
    /// Rewrite every action on a reply record to `archive`.
    ReplyArchives,
}

impl PropagationMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Faithful => "faithful",
            Self::ReplyArchives => "reply_archives",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "faithful" | "requested" => Some(Self::Faithful),
            "reply_archives" | "reply-archives" | "legacy" => Some(Self::ReplyArchives),
            _ => None,
        }
    }

    /// The action actually written for a record, given whether its message
    /// is a reply.
    #[must_use]
    pub const fn effective_action(self, requested: ThreadAction, is_reply: bool) -> ThreadAction {
        match self {
            Self::ReplyArchives if is_reply => ThreadAction::Archive,
            _ => requested,
        }
    }
}
