//! Message composition: forward, reply and reply-all drafts.
//!
//! Builders here are pure. They read a [`RecipientView`] (one receiver's
//! view of a message) and return a [`MessageDraft`]; validation and
//! persistence happen in the store.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::models::{MessageState, Receiver, RecipientKind};
use crate::thread::{Threaded, anchor_of};

/// A persisted message together with its ordered addressee lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: i64,
    pub subject: String,
    pub body: String,
    pub sender: Receiver,
    pub state: MessageState,
    pub original_message_id: Option<i64>,
    pub to: Vec<Receiver>,
    pub cc: Vec<Receiver>,
    pub bcc: Vec<Receiver>,
}

impl Threaded for MessageView {
    fn message_id(&self) -> i64 {
        self.id
    }

    fn original_message_id(&self) -> Option<i64> {
        self.original_message_id
    }
}

/// One receiver's view of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientView {
    pub recipient_id: i64,
    pub receiver: Receiver,
    pub kind: RecipientKind,
    pub message: MessageView,
}

/// A message that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDraft {
    pub sender: Receiver,
    pub subject: String,
    pub body: String,
    pub original_message_id: Option<i64>,
    pub to: Vec<Receiver>,
    pub cc: Vec<Receiver>,
    pub bcc: Vec<Receiver>,
}

impl MessageDraft {
    #[must_use]
    pub fn new(sender: Receiver, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            sender,
            subject: subject.into(),
            body: body.into(),
            original_message_id: None,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
        }
    }

    #[must_use]
    pub fn to(mut self, receiver: Receiver) -> Self {
        self.to.push(receiver);
        self
    }

    #[must_use]
    pub fn cc(mut self, receiver: Receiver) -> Self {
        self.cc.push(receiver);
        self
    }

    #[must_use]
    pub fn bcc(mut self, receiver: Receiver) -> Self {
        self.bcc.push(receiver);
        self
    }

    #[must_use]
    pub const fn in_reply_to(mut self, anchor_id: i64) -> Self {
        self.original_message_id = Some(anchor_id);
        self
    }

    /// Every addressee with its kind, in `to`, `cc`, `bcc` order.
    pub fn recipients(&self) -> impl Iterator<Item = (RecipientKind, &Receiver)> {
        self.to
            .iter()
            .map(|r| (RecipientKind::To, r))
            .chain(self.cc.iter().map(|r| (RecipientKind::Cc, r)))
            .chain(self.bcc.iter().map(|r| (RecipientKind::Bcc, r)))
    }
}

/// Forward: same subject and body, sent by the viewing receiver, with no
/// addressees and no anchor. A forward starts a new thread.
#[must_use]
pub fn forward(view: &RecipientView) -> MessageDraft {
    MessageDraft::new(
        view.receiver.clone(),
        view.message.subject.clone(),
        view.message.body.clone(),
    )
}

/// Reply to the original sender only, anchored at the thread root.
#[must_use]
pub fn reply(view: &RecipientView) -> MessageDraft {
    forward(view)
        .in_reply_to(anchor_of(&view.message))
        .to(view.message.sender.clone())
}

/// Reply to the original sender and every `to` addressee; keep `cc` and
/// `bcc` minus the viewing receiver.
#[must_use]
pub fn reply_to_all(view: &RecipientView) -> MessageDraft {
    let message = &view.message;
    let mut draft = forward(view).in_reply_to(anchor_of(message));

    let to: IndexSet<Receiver> = message
        .to
        .iter()
        .cloned()
        .chain(std::iter::once(message.sender.clone()))
        .collect();
    draft.to = to.into_iter().collect();
    draft.cc = without(&message.cc, &view.receiver);
    draft.bcc = without(&message.bcc, &view.receiver);
    draft
}

fn without(list: &[Receiver], receiver: &Receiver) -> Vec<Receiver> {
    list.iter().filter(|r| *r != receiver).cloned().collect()
}
