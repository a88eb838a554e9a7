//! Recipient state machines.
//!
//! A recipient row carries three independent fields: read state, visibility
//! and label. Each is its own small automaton with its own transition
//! function, and [`RecipientState`] only composes them. An event touches
//! exactly one field.
//!
//! The only guarded transition is [`RecipientState::view`], which requires
//! the owning message to be `sent`. A denied view is not an error: it
//! returns [`Transition::Denied`] and leaves the state alone.
//!
//! Bulk thread updates in the store write these fields directly and do not
//! go through this module.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::MessageState;

/// Outcome of a single-record transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// The field changed.
    Applied,
    /// The field already held the target value.
    Unchanged,
    /// The guard rejected the event; nothing changed.
    Denied,
}

impl Transition {
    #[must_use]
    pub const fn changed(self) -> bool {
        matches!(self, Self::Applied)
    }
}

// =============================================================================
// ReadState
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadState {
    #[default]
    Unread,
    Read,
}

impl ReadState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Read => "read",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "unread" => Ok(Self::Unread),
            "read" => Ok(Self::Read),
            _ => Err(Error::unknown("read state", value)),
        }
    }

    /// `unread -> read`, only once the message is sent.
    #[must_use]
    pub fn view(self, message: MessageState) -> (Self, Transition) {
        match (self, message) {
            (Self::Read, _) => (self, Transition::Unchanged),
            (Self::Unread, MessageState::Sent) => (Self::Read, Transition::Applied),
            (Self::Unread, _) => (self, Transition::Denied),
        }
    }
}

impl fmt::Display for ReadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Visibility
// =============================================================================

/// Whether the receiver still sees the record. "Deleting" a message hides it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden {
        /// Microseconds since Unix epoch.
        at: i64,
    },
}

impl Visibility {
    /// Build from the stored nullable hide timestamp.
    #[must_use]
    pub const fn from_hidden_at(hidden_at: Option<i64>) -> Self {
        match hidden_at {
            Some(at) => Self::Hidden { at },
            None => Self::Visible,
        }
    }

    #[must_use]
    pub const fn hidden_at(self) -> Option<i64> {
        match self {
            Self::Visible => None,
            Self::Hidden { at } => Some(at),
        }
    }

    #[must_use]
    pub const fn is_hidden(self) -> bool {
        matches!(self, Self::Hidden { .. })
    }

    /// Hiding an already hidden record keeps its original timestamp.
    #[must_use]
    pub const fn hide(self, now: i64) -> (Self, Transition) {
        match self {
            Self::Visible => (Self::Hidden { at: now }, Transition::Applied),
            Self::Hidden { .. } => (self, Transition::Unchanged),
        }
    }

    #[must_use]
    pub const fn unhide(self) -> (Self, Transition) {
        match self {
            Self::Visible => (self, Transition::Unchanged),
            Self::Hidden { .. } => (Self::Visible, Transition::Applied),
        }
    }
}

// =============================================================================
// Label
// =============================================================================

/// Single-valued tag. There is no transition back to `none`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    #[default]
    None,
    Archived,
    Spam,
}

impl Label {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Archived => "archived",
            Self::Spam => "spam",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(Self::None),
            "archived" => Ok(Self::Archived),
            "spam" => Ok(Self::Spam),
            _ => Err(Error::unknown("label", value)),
        }
    }

    #[must_use]
    pub fn archive(self) -> (Self, Transition) {
        self.relabel(Self::Archived)
    }

    #[must_use]
    pub fn mark_spam(self) -> (Self, Transition) {
        self.relabel(Self::Spam)
    }

    fn relabel(self, target: Self) -> (Self, Transition) {
        if self == target {
            (self, Transition::Unchanged)
        } else {
            (target, Transition::Applied)
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// RecipientState
// =============================================================================

/// The three state fields of one recipient record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RecipientState {
    pub read_state: ReadState,
    pub visibility: Visibility,
    pub label: Label,
}

impl RecipientState {
    /// Mark as read. Denied unless `message` is [`MessageState::Sent`].
    pub fn view(&mut self, message: MessageState) -> Transition {
        let (next, outcome) = self.read_state.view(message);
        self.read_state = next;
        outcome
    }

    /// Hide, recording `now` (microseconds) as the hide time.
    pub const fn hide(&mut self, now: i64) -> Transition {
        let (next, outcome) = self.visibility.hide(now);
        self.visibility = next;
        outcome
    }

    pub const fn unhide(&mut self) -> Transition {
        let (next, outcome) = self.visibility.unhide();
        self.visibility = next;
        outcome
    }

    pub fn archive(&mut self) -> Transition {
        let (next, outcome) = self.label.archive();
        self.label = next;
        outcome
    }

    pub fn mark_spam(&mut self) -> Transition {
        let (next, outcome) = self.label.mark_spam();
        self.label = next;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn initial_state() {
        let state = RecipientState::default();
        assert_eq!(state.read_state, ReadState::Unread);
        assert_eq!(state.visibility, Visibility::Visible);
        assert_eq!(state.label, Label::None);
    }

    #[test]
    fn view_requires_sent_message() {
        for message in [MessageState::Unsent, MessageState::Queued] {
            let mut state = RecipientState::default();
            assert_eq!(state.view(message), Transition::Denied);
            assert_eq!(state.read_state, ReadState::Unread);
        }

        let mut state = RecipientState::default();
        assert_eq!(state.view(MessageState::Sent), Transition::Applied);
        assert_eq!(state.read_state, ReadState::Read);
        assert_eq!(state.view(MessageState::Sent), Transition::Unchanged);
        assert_eq!(state.read_state, ReadState::Read);
    }

    #[test]
    fn hide_records_timestamp_and_unhide_clears_it() {
        let mut state = RecipientState::default();
        assert_eq!(state.hide(42), Transition::Applied);
        assert_eq!(state.visibility, Visibility::Hidden { at: 42 });
        assert_eq!(state.hide(99), Transition::Unchanged);
        assert_eq!(state.visibility.hidden_at(), Some(42));

        assert_eq!(state.unhide(), Transition::Applied);
        assert_eq!(state.visibility, Visibility::Visible);
        assert_eq!(state.visibility.hidden_at(), None);
        assert_eq!(state.unhide(), Transition::Unchanged);
    }

    #[test]
    fn labels_switch_freely() {
        let mut state = RecipientState::default();
        assert_eq!(state.archive(), Transition::Applied);
        assert_eq!(state.label, Label::Archived);
        assert_eq!(state.archive(), Transition::Unchanged);
        assert_eq!(state.mark_spam(), Transition::Applied);
        assert_eq!(state.label, Label::Spam);
        assert_eq!(state.archive(), Transition::Applied);
        assert_eq!(state.label, Label::Archived);
    }

    #[test]
    fn fields_are_orthogonal() {
        let mut state = RecipientState::default();
        state.view(MessageState::Sent);
        state.hide(1);
        state.archive();
        assert_eq!(state.read_state, ReadState::Read);
        assert!(state.visibility.is_hidden());
        assert_eq!(state.label, Label::Archived);
    }

    #[test]
    fn visibility_from_hidden_at() {
        assert_eq!(Visibility::from_hidden_at(None), Visibility::Visible);
        assert_eq!(
            Visibility::from_hidden_at(Some(5)),
            Visibility::Hidden { at: 5 }
        );
    }

    #[test]
    fn label_parse_rejects_unknown() {
        assert_eq!(Label::parse("archived"), Ok(Label::Archived));
        assert_eq!(Label::parse("none"), Ok(Label::None));
        assert!(Label::parse("starred").is_err());
        assert!(ReadState::parse("skimmed").is_err());
    }

    #[derive(Debug, Clone, Copy)]
    enum Event {
        Hide(i64),
        Unhide,
        Archive,
        Spam,
    }

    fn arb_event() -> impl Strategy<Value = Event> {
        prop_oneof![
            (0i64..1_000_000).prop_map(Event::Hide),
            Just(Event::Unhide),
            Just(Event::Archive),
            Just(Event::Spam),
        ]
    }

    fn apply(state: &mut RecipientState, event: Event) {
        match event {
            Event::Hide(at) => {
                state.hide(at);
            }
            Event::Unhide => {
                state.unhide();
            }
            Event::Archive => {
                state.archive();
            }
            Event::Spam => {
                state.mark_spam();
            }
        }
    }

    proptest! {
        /// Visibility ends up determined by the last hide/unhide event only.
        #[test]
        fn prop_visibility_follows_last_event(events in proptest::collection::vec(arb_event(), 0..40)) {
            let mut state = RecipientState::default();
            for event in &events {
                apply(&mut state, *event);
            }
            let last = events.iter().rev().find(|e| matches!(e, Event::Hide(_) | Event::Unhide));
            match last {
                None | Some(Event::Unhide) => {
                    prop_assert_eq!(state.visibility, Visibility::Visible);
                }
                Some(_) => {
                    prop_assert!(state.visibility.is_hidden());
                }
            }
        }

        /// Label ends up at whatever the last label event asked for.
        #[test]
        fn prop_label_follows_last_event(events in proptest::collection::vec(arb_event(), 0..40)) {
            let mut state = RecipientState::default();
            for event in &events {
                apply(&mut state, *event);
            }
            let expected = match events.iter().rev().find(|e| matches!(e, Event::Archive | Event::Spam)) {
                None => Label::None,
                Some(Event::Archive) => Label::Archived,
                Some(_) => Label::Spam,
            };
            prop_assert_eq!(state.label, expected);
            prop_assert_eq!(state.read_state, ReadState::Unread);
        }
    }
}
