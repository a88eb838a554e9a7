//! Integration tests for message and recipient operations.
//!
//! Covers:
//! - Message lifecycle (`unsent -> queued -> sent`)
//! - Anchor validation on create
//! - Dense positions per `(message, kind)` under add, delete and concurrent add
//! - Guarded single-record transitions

#![allow(clippy::too_many_lines, clippy::cast_possible_wrap)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier};

use proptest::prelude::*;
use threadmail_core::{
    Label, MessageDraft, MessageState, ReadState, Receiver, RecipientKind, Transition,
};
use threadmail_db::{
    DbError, DbPool, DbPoolConfig, add_recipient, archive_recipient, create_message,
    delete_recipient, deliver_message, get_message, get_recipient, hide_recipient,
    list_recipients, mark_recipient_spam, queue_message, recipient_view, unhide_recipient,
    view_recipient,
};

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

fn make_pool() -> (DbPool, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("create tempdir");
    let db_path = dir
        .path()
        .join(format!("recipients_{}.db", unique_suffix()));
    let config = DbPoolConfig {
        database_url: format!("sqlite:///{}", db_path.display()),
        max_connections: 8,
        ..DbPoolConfig::default()
    };
    let pool = DbPool::new(&config).expect("create pool");
    (pool, dir)
}

fn user(id: i64) -> Receiver {
    Receiver::new("User", id)
}

fn positions(pool: &DbPool, message_id: i64, kind: RecipientKind) -> Vec<i64> {
    list_recipients(pool, message_id, Some(kind))
        .expect("list recipients")
        .iter()
        .map(|r| r.position)
        .collect()
}

fn assert_dense(pool: &DbPool, message_id: i64) {
    for kind in RecipientKind::ALL {
        let got = positions(pool, message_id, kind);
        let want: Vec<i64> = (1..=got.len() as i64).collect();
        assert_eq!(got, want, "{kind} positions not dense");
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn create_starts_unsent_with_positions_in_draft_order() {
    let (pool, _dir) = make_pool();
    let message = create_message(
        &pool,
        &MessageDraft::new(user(1), "Hello", "World")
            .to(user(2))
            .to(user(3))
            .cc(user(4))
            .bcc(user(5)),
    )
    .expect("create");

    assert_eq!(message.state, MessageState::Unsent);
    assert_eq!(message.original_message_id, None);
    assert_eq!(message.created_ts, message.updated_ts);

    let rows = list_recipients(&pool, message.id, None).expect("list");
    let summary: Vec<(RecipientKind, i64, i64)> = rows
        .iter()
        .map(|r| (r.kind, r.receiver.receiver_id, r.position))
        .collect();
    assert_eq!(
        summary,
        vec![
            (RecipientKind::To, 2, 1),
            (RecipientKind::To, 3, 2),
            (RecipientKind::Cc, 4, 1),
            (RecipientKind::Bcc, 5, 1),
        ]
    );
    for r in &rows {
        assert_eq!(r.read_state, ReadState::Unread);
        assert_eq!(r.label, Label::None);
        assert!(!r.is_hidden());
    }
}

#[test]
fn queue_then_deliver() {
    let (pool, _dir) = make_pool();
    let message = create_message(&pool, &MessageDraft::new(user(1), "s", "b")).expect("create");

    let queued = queue_message(&pool, message.id).expect("queue");
    assert_eq!(queued.state, MessageState::Queued);
    assert!(queued.updated_ts >= message.updated_ts);

    let sent = deliver_message(&pool, message.id).expect("deliver");
    assert_eq!(sent.state, MessageState::Sent);
    assert_eq!(get_message(&pool, message.id).expect("get").state, MessageState::Sent);
}

#[test]
fn deliver_straight_from_unsent() {
    let (pool, _dir) = make_pool();
    let message = create_message(&pool, &MessageDraft::new(user(1), "s", "b")).expect("create");
    let sent = deliver_message(&pool, message.id).expect("deliver");
    assert_eq!(sent.state, MessageState::Sent);
}

#[test]
fn lifecycle_does_not_go_backwards() {
    let (pool, _dir) = make_pool();
    let message = create_message(&pool, &MessageDraft::new(user(1), "s", "b")).expect("create");
    deliver_message(&pool, message.id).expect("deliver");

    let err = queue_message(&pool, message.id).expect_err("sent cannot queue");
    assert_eq!(err.error_code(), "INVALID_TRANSITION");
    let err = deliver_message(&pool, message.id).expect_err("sent cannot deliver");
    assert_eq!(err.error_code(), "INVALID_TRANSITION");
    assert_eq!(get_message(&pool, message.id).expect("get").state, MessageState::Sent);
}

#[test]
fn missing_message_is_not_found() {
    let (pool, _dir) = make_pool();
    assert!(matches!(
        get_message(&pool, 77),
        Err(DbError::NotFound { entity: "Message", .. })
    ));
    assert!(matches!(
        deliver_message(&pool, 77),
        Err(DbError::NotFound { .. })
    ));
    assert!(matches!(
        add_recipient(&pool, 77, &user(2), RecipientKind::To),
        Err(DbError::NotFound { .. })
    ));
}

// =============================================================================
// Anchors
// =============================================================================

#[test]
fn reply_to_missing_anchor_is_rejected() {
    let (pool, _dir) = make_pool();
    let err = create_message(
        &pool,
        &MessageDraft::new(user(1), "Re:", "?").in_reply_to(123).to(user(2)),
    )
    .expect_err("missing anchor");
    assert!(matches!(err, DbError::NotFound { entity: "Message", .. }));
}

#[test]
fn reply_anchored_at_a_reply_is_rejected_and_rolled_back() {
    let (pool, _dir) = make_pool();
    let root = create_message(&pool, &MessageDraft::new(user(1), "Root", "")).expect("root");
    let reply = create_message(
        &pool,
        &MessageDraft::new(user(2), "Re: Root", "").in_reply_to(root.id),
    )
    .expect("reply");

    let err = create_message(
        &pool,
        &MessageDraft::new(user(3), "Re: Re: Root", "")
            .in_reply_to(reply.id)
            .to(user(1)),
    )
    .expect_err("double anchor");
    assert_eq!(err.error_code(), "INVALID_ARGUMENT");

    let next = create_message(&pool, &MessageDraft::new(user(1), "Next", "")).expect("next");
    assert_eq!(next.id, reply.id + 1, "rejected insert must not consume an id");
}

// =============================================================================
// Positions
// =============================================================================

#[test]
fn positions_compact_after_delete() {
    let (pool, _dir) = make_pool();
    let message = create_message(&pool, &MessageDraft::new(user(1), "s", "b")).expect("create");

    let a = add_recipient(&pool, message.id, &user(2), RecipientKind::To).expect("a");
    let b = add_recipient(&pool, message.id, &user(3), RecipientKind::To).expect("b");
    let c = add_recipient(&pool, message.id, &user(4), RecipientKind::To).expect("c");
    assert_eq!((a.position, b.position, c.position), (1, 2, 3));

    delete_recipient(&pool, b.id).expect("delete b");
    assert_eq!(positions(&pool, message.id, RecipientKind::To), vec![1, 2]);
    assert_eq!(get_recipient(&pool, c.id).expect("c").position, 2);

    let d = add_recipient(&pool, message.id, &user(5), RecipientKind::To).expect("d");
    assert_eq!(d.position, 3);
}

#[test]
fn kinds_have_independent_sequences() {
    let (pool, _dir) = make_pool();
    let message = create_message(&pool, &MessageDraft::new(user(1), "s", "b")).expect("create");

    add_recipient(&pool, message.id, &user(2), RecipientKind::To).expect("to");
    let cc = add_recipient(&pool, message.id, &user(3), RecipientKind::Cc).expect("cc");
    add_recipient(&pool, message.id, &user(4), RecipientKind::To).expect("to");
    assert_eq!(cc.position, 1);

    delete_recipient(&pool, cc.id).expect("delete cc");
    assert_eq!(positions(&pool, message.id, RecipientKind::To), vec![1, 2]);
    assert!(positions(&pool, message.id, RecipientKind::Cc).is_empty());
}

#[test]
fn delete_missing_recipient_is_not_found() {
    let (pool, _dir) = make_pool();
    assert!(matches!(
        delete_recipient(&pool, 5),
        Err(DbError::NotFound { entity: "Recipient", .. })
    ));
}

#[test]
fn concurrent_adds_keep_positions_dense() {
    let (pool, _dir) = make_pool();
    let message = create_message(&pool, &MessageDraft::new(user(1), "s", "b")).expect("create");

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let pool = pool.clone();
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                add_recipient(&pool, message.id, &user(100 + i as i64), RecipientKind::To)
                    .expect("concurrent add")
            })
        })
        .collect();
    for h in handles {
        h.join().expect("join");
    }

    assert_eq!(
        positions(&pool, message.id, RecipientKind::To),
        (1..=threads as i64).collect::<Vec<_>>()
    );
}

#[derive(Debug, Clone)]
enum Op {
    Add(RecipientKind),
    Delete(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::sample::select(RecipientKind::ALL.to_vec()).prop_map(Op::Add),
        any::<usize>().prop_map(Op::Delete),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn positions_stay_dense(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let pool = DbPool::new(&DbPoolConfig::in_memory()).expect("pool");
        let message = create_message(&pool, &MessageDraft::new(user(1), "s", "b")).expect("create");
        let mut next_receiver = 2;
        for op in ops {
            match op {
                Op::Add(kind) => {
                    add_recipient(&pool, message.id, &user(next_receiver), kind).expect("add");
                    next_receiver += 1;
                }
                Op::Delete(pick) => {
                    let rows = list_recipients(&pool, message.id, None).expect("list");
                    if !rows.is_empty() {
                        delete_recipient(&pool, rows[pick % rows.len()].id).expect("delete");
                    }
                }
            }
        }
        for kind in RecipientKind::ALL {
            let got = positions(&pool, message.id, kind);
            let want: Vec<i64> = (1..=got.len() as i64).collect();
            prop_assert_eq!(got, want);
        }
    }
}

// =============================================================================
// Single-record transitions
// =============================================================================

#[test]
fn view_is_guarded_by_message_state() {
    let (pool, _dir) = make_pool();
    let message = create_message(&pool, &MessageDraft::new(user(1), "s", "b").to(user(2)))
        .expect("create");
    let record = list_recipients(&pool, message.id, None).expect("list")[0].clone();

    assert_eq!(view_recipient(&pool, record.id).expect("view"), Transition::Denied);
    queue_message(&pool, message.id).expect("queue");
    assert_eq!(view_recipient(&pool, record.id).expect("view"), Transition::Denied);
    assert_eq!(get_recipient(&pool, record.id).expect("get").read_state, ReadState::Unread);

    deliver_message(&pool, message.id).expect("deliver");
    assert_eq!(view_recipient(&pool, record.id).expect("view"), Transition::Applied);
    assert_eq!(view_recipient(&pool, record.id).expect("view"), Transition::Unchanged);
    assert_eq!(get_recipient(&pool, record.id).expect("get").read_state, ReadState::Read);
}

#[test]
fn hide_and_unhide_single_record() {
    let (pool, _dir) = make_pool();
    let message = create_message(
        &pool,
        &MessageDraft::new(user(1), "s", "b").to(user(2)).to(user(3)),
    )
    .expect("create");
    let rows = list_recipients(&pool, message.id, None).expect("list");

    assert_eq!(hide_recipient(&pool, rows[0].id).expect("hide"), Transition::Applied);
    let hidden = get_recipient(&pool, rows[0].id).expect("get");
    assert!(hidden.is_hidden());
    assert!(hidden.hidden_at_naive().is_some());
    assert!(!get_recipient(&pool, rows[1].id).expect("get").is_hidden());

    assert_eq!(hide_recipient(&pool, rows[0].id).expect("hide"), Transition::Unchanged);
    assert_eq!(
        get_recipient(&pool, rows[0].id).expect("get").visibility,
        hidden.visibility,
        "re-hiding keeps the first timestamp"
    );

    assert_eq!(unhide_recipient(&pool, rows[0].id).expect("unhide"), Transition::Applied);
    assert!(!get_recipient(&pool, rows[0].id).expect("get").is_hidden());
}

#[test]
fn archive_then_spam_single_record() {
    let (pool, _dir) = make_pool();
    let message = create_message(&pool, &MessageDraft::new(user(1), "s", "b").to(user(2)))
        .expect("create");
    let id = list_recipients(&pool, message.id, None).expect("list")[0].id;

    assert_eq!(archive_recipient(&pool, id).expect("archive"), Transition::Applied);
    assert_eq!(archive_recipient(&pool, id).expect("archive"), Transition::Unchanged);
    assert_eq!(mark_recipient_spam(&pool, id).expect("spam"), Transition::Applied);
    assert_eq!(get_recipient(&pool, id).expect("get").label, Label::Spam);
}

#[test]
fn recipient_view_lists_addressees_by_kind() {
    let (pool, _dir) = make_pool();
    let message = create_message(
        &pool,
        &MessageDraft::new(user(1), "s", "b")
            .to(user(2))
            .cc(user(3))
            .bcc(user(4)),
    )
    .expect("create");
    let cc_id = list_recipients(&pool, message.id, Some(RecipientKind::Cc)).expect("list")[0].id;

    let view = recipient_view(&pool, cc_id).expect("view");
    assert_eq!(view.receiver, user(3));
    assert_eq!(view.kind, RecipientKind::Cc);
    assert_eq!(view.message.sender, user(1));
    assert_eq!(view.message.to, vec![user(2)]);
    assert_eq!(view.message.cc, vec![user(3)]);
    assert_eq!(view.message.bcc, vec![user(4)]);
}
