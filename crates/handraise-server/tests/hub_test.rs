//! Hub behavior tests.
//!
//! End-to-end command handling against an in-memory store: join snapshots,
//! broadcast fan-out and ordering, vote parity, host authority, and the
//! room-close cascade.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use handraise_proto::{Ack, ClientCommand, ErrorKind, Notification, Role, ServerMessage};
use handraise_server::{Environment, Hub, HubConfig, store::MemoryStore};
use tokio::sync::mpsc;

// Test environment using system RNG and a counter-driven wall clock so
// timestamps are distinct and observable.
#[derive(Clone)]
struct TestEnv {
    wall_clock: Arc<AtomicU64>,
}

impl TestEnv {
    fn new() -> Self {
        Self { wall_clock: Arc::new(AtomicU64::new(1_000)) }
    }
}

impl Environment for TestEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        async move {
            tokio::time::sleep(duration).await;
        }
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        use rand::RngCore;
        rand::thread_rng().fill_bytes(buffer);
    }

    fn wall_clock_secs(&self) -> u64 {
        self.wall_clock.fetch_add(1, Ordering::Relaxed)
    }
}

struct TestClient {
    session_id: u64,
    rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl TestClient {
    /// Next queued message; panics if none arrived.
    fn recv(&mut self) -> ServerMessage {
        self.rx.try_recv().expect("expected a queued message")
    }

    fn recv_event(&mut self) -> Notification {
        match self.recv() {
            ServerMessage::Event { event } => event,
            other => panic!("expected event, got {other:?}"),
        }
    }

    fn assert_silent(&mut self) {
        assert!(self.rx.try_recv().is_err(), "expected no queued message");
    }
}

type TestHub = Hub<TestEnv, MemoryStore>;

fn test_hub() -> Arc<TestHub> {
    Arc::new(Hub::new(TestEnv::new(), MemoryStore::new(), HubConfig::default()))
}

fn connect(hub: &TestHub, identity: &str) -> TestClient {
    let (tx, rx) = mpsc::unbounded_channel();
    let session_id = hub.connect(identity, tx).unwrap();
    TestClient { session_id, rx }
}

/// Connect and join, draining the snapshot event.
async fn join(hub: &TestHub, identity: &str, room_id: &str, role: Role) -> TestClient {
    let mut client = connect(hub, identity);
    let ack = hub
        .handle(
            client.session_id,
            ClientCommand::JoinRoom { room_id: room_id.to_string(), role },
        )
        .await;
    assert!(ack.is_success(), "join failed: {ack:?}");
    let snapshot = client.recv_event();
    assert!(matches!(snapshot, Notification::ExistingQuestions { .. }));
    client
}

fn assert_error(ack: &Ack, kind: ErrorKind) {
    match ack {
        Ack::Error { kind: actual, .. } => assert_eq!(*actual, kind),
        Ack::Success { .. } => panic!("expected {kind:?} error, got success"),
    }
}

#[tokio::test]
async fn full_room_lifecycle_broadcast_sequence() {
    let hub = test_hub();
    hub.create_room("12345", "Graph algorithms", "u1").unwrap();

    let host = join(&hub, "u1", "12345", Role::Host).await;
    let mut u2 = join(&hub, "u2", "12345", Role::Participant).await;
    let mut u3 = join(&hub, "u3", "12345", Role::Participant).await;
    let mut host = host;

    // u2 submits a question; everyone sees it with its server-assigned id.
    let ack = hub
        .handle(
            u2.session_id,
            ClientCommand::SubmitQuestion {
                room_id: "12345".to_string(),
                text: "What is BFS?".to_string(),
                author_name: "Bea".to_string(),
            },
        )
        .await;
    let question = match ack {
        Ack::Success { data: Some(q) } => q,
        other => panic!("expected question in ack, got {other:?}"),
    };
    assert_eq!(question.text, "What is BFS?");
    assert_eq!(question.author_identity, "u2");
    assert_eq!(question.upvotes, 0);

    for client in [&mut host, &mut u2, &mut u3] {
        match client.recv_event() {
            Notification::QuestionCreated { room_id, question: q } => {
                assert_eq!(room_id, "12345");
                assert_eq!(q, question);
            },
            other => panic!("expected questionCreated, got {other:?}"),
        }
    }

    // u3 upvotes; count is derived from the voter set.
    let ack = hub
        .handle(
            u3.session_id,
            ClientCommand::Upvote { room_id: "12345".to_string(), question_id: question.id },
        )
        .await;
    assert!(ack.is_success());

    for client in [&mut host, &mut u2, &mut u3] {
        match client.recv_event() {
            Notification::VoteUpdated { question_id, upvotes, voters, .. } => {
                assert_eq!(question_id, question.id);
                assert_eq!(upvotes, 1);
                assert!(voters.contains("u3"));
            },
            other => panic!("expected voteUpdated, got {other:?}"),
        }
    }

    // Host marks it answered.
    let ack = hub
        .handle(
            host.session_id,
            ClientCommand::MarkAnswered { room_id: "12345".to_string(), question_id: question.id },
        )
        .await;
    assert!(ack.is_success());

    for client in [&mut host, &mut u2, &mut u3] {
        match client.recv_event() {
            Notification::AnsweredToggled { answered, answered_at_secs, .. } => {
                assert!(answered);
                assert!(answered_at_secs.is_some());
            },
            other => panic!("expected answeredToggled, got {other:?}"),
        }
    }

    // Host closes the room; members are notified, then evicted.
    let ack = hub
        .handle(host.session_id, ClientCommand::CloseRoom { room_id: "12345".to_string() })
        .await;
    assert!(ack.is_success());

    for client in [&mut host, &mut u2, &mut u3] {
        match client.recv_event() {
            Notification::RoomClosed { room_id, .. } => assert_eq!(room_id, "12345"),
            other => panic!("expected roomClosed, got {other:?}"),
        }
    }

    assert!(!hub.room_exists("12345").unwrap());

    // A former member's next command bounces: membership is gone.
    let ack = hub
        .handle(
            u2.session_id,
            ClientCommand::SubmitQuestion {
                room_id: "12345".to_string(),
                text: "Too late?".to_string(),
                author_name: "Bea".to_string(),
            },
        )
        .await;
    assert_error(&ack, ErrorKind::Unauthorized);
    u2.assert_silent();
}

#[tokio::test]
async fn vote_parity_up_repeat_down_repeat() {
    let hub = test_hub();
    hub.create_room("12345", "Topic", "u1").unwrap();
    let mut u2 = join(&hub, "u2", "12345", Role::Participant).await;

    let ack = hub
        .handle(
            u2.session_id,
            ClientCommand::SubmitQuestion {
                room_id: "12345".to_string(),
                text: "Why?".to_string(),
                author_name: "Bea".to_string(),
            },
        )
        .await;
    let question = match ack {
        Ack::Success { data: Some(q) } => q,
        other => panic!("{other:?}"),
    };
    u2.recv_event();

    let upvote =
        ClientCommand::Upvote { room_id: "12345".to_string(), question_id: question.id };
    let downvote =
        ClientCommand::Downvote { room_id: "12345".to_string(), question_id: question.id };

    // Up: 0 → 1.
    hub.handle(u2.session_id, upvote.clone()).await;
    match u2.recv_event() {
        Notification::VoteUpdated { upvotes, .. } => assert_eq!(upvotes, 1),
        other => panic!("{other:?}"),
    }

    // Repeat up: silent no-op, still broadcast as the authoritative state.
    let ack = hub.handle(u2.session_id, upvote.clone()).await;
    assert!(ack.is_success());
    match u2.recv_event() {
        Notification::VoteUpdated { upvotes, voters, .. } => {
            assert_eq!(upvotes, 1);
            assert_eq!(upvotes as usize, voters.len());
        },
        other => panic!("{other:?}"),
    }

    // Down: 1 → 0, and repeat down stays at 0.
    hub.handle(u2.session_id, downvote.clone()).await;
    match u2.recv_event() {
        Notification::VoteUpdated { upvotes, .. } => assert_eq!(upvotes, 0),
        other => panic!("{other:?}"),
    }

    let ack = hub.handle(u2.session_id, downvote).await;
    assert!(ack.is_success());
    match u2.recv_event() {
        Notification::VoteUpdated { upvotes, voters, .. } => {
            assert_eq!(upvotes, 0);
            assert!(voters.is_empty());
        },
        other => panic!("{other:?}"),
    }
}

#[tokio::test]
async fn join_snapshot_contains_all_questions_including_answered() {
    let hub = test_hub();
    hub.create_room("12345", "Topic", "u1").unwrap();
    let host = join(&hub, "u1", "12345", Role::Host).await;

    let mut ids = Vec::new();
    for i in 0..5 {
        let ack = hub
            .handle(
                host.session_id,
                ClientCommand::SubmitQuestion {
                    room_id: "12345".to_string(),
                    text: format!("Question {i}"),
                    author_name: "Host".to_string(),
                },
            )
            .await;
        match ack {
            Ack::Success { data: Some(q) } => ids.push(q.id),
            other => panic!("{other:?}"),
        }
    }
    hub.handle(
        host.session_id,
        ClientCommand::MarkAnswered { room_id: "12345".to_string(), question_id: ids[0] },
    )
    .await;

    // Late joiner gets the full snapshot, in creation order.
    let mut late = connect(&hub, "u9");
    let ack = hub
        .handle(
            late.session_id,
            ClientCommand::JoinRoom { room_id: "12345".to_string(), role: Role::Participant },
        )
        .await;
    assert!(ack.is_success());

    match late.recv_event() {
        Notification::ExistingQuestions { room_id, questions } => {
            assert_eq!(room_id, "12345");
            assert_eq!(questions.iter().map(|q| q.id).collect::<Vec<_>>(), ids);
            assert!(questions[0].answered);
        },
        other => panic!("expected snapshot, got {other:?}"),
    }
    late.assert_silent();
}

#[tokio::test]
async fn concurrent_distinct_voters_both_count() {
    let hub = test_hub();
    hub.create_room("12345", "Topic", "u1").unwrap();
    let u2 = join(&hub, "u2", "12345", Role::Participant).await;
    let u3 = join(&hub, "u3", "12345", Role::Participant).await;

    let ack = hub
        .handle(
            u2.session_id,
            ClientCommand::SubmitQuestion {
                room_id: "12345".to_string(),
                text: "Why?".to_string(),
                author_name: "Bea".to_string(),
            },
        )
        .await;
    let question_id = match ack {
        Ack::Success { data: Some(q) } => q.id,
        other => panic!("{other:?}"),
    };

    let upvote = ClientCommand::Upvote { room_id: "12345".to_string(), question_id };
    let (a, b) = tokio::join!(
        hub.handle(u2.session_id, upvote.clone()),
        hub.handle(u3.session_id, upvote.clone()),
    );
    assert!(a.is_success());
    assert!(b.is_success());

    // Both voters landed exactly once.
    let final_state = match hub.handle(u2.session_id, upvote).await {
        Ack::Success { data: Some(q) } => q,
        other => panic!("{other:?}"),
    };
    assert_eq!(final_state.upvotes, 2);
    assert_eq!(final_state.voters.len(), 2);
}

#[tokio::test]
async fn concurrent_duplicate_votes_net_one() {
    let hub = test_hub();
    hub.create_room("12345", "Topic", "u1").unwrap();
    let u2 = join(&hub, "u2", "12345", Role::Participant).await;

    let ack = hub
        .handle(
            u2.session_id,
            ClientCommand::SubmitQuestion {
                room_id: "12345".to_string(),
                text: "Why?".to_string(),
                author_name: "Bea".to_string(),
            },
        )
        .await;
    let question_id = match ack {
        Ack::Success { data: Some(q) } => q.id,
        other => panic!("{other:?}"),
    };

    // Two identical upvotes race; whatever the interleaving, the voter
    // lands in the set exactly once.
    let upvote = ClientCommand::Upvote { room_id: "12345".to_string(), question_id };
    tokio::join!(
        hub.handle(u2.session_id, upvote.clone()),
        hub.handle(u2.session_id, upvote.clone()),
    );

    let final_state = match hub.handle(u2.session_id, upvote).await {
        Ack::Success { data: Some(q) } => q,
        other => panic!("{other:?}"),
    };
    assert_eq!(final_state.upvotes, 1);
    assert_eq!(final_state.voters.len(), 1);
}

#[tokio::test]
async fn double_toggle_restores_unanswered() {
    let hub = test_hub();
    hub.create_room("12345", "Topic", "u1").unwrap();
    let host = join(&hub, "u1", "12345", Role::Host).await;

    let ack = hub
        .handle(
            host.session_id,
            ClientCommand::SubmitQuestion {
                room_id: "12345".to_string(),
                text: "Why?".to_string(),
                author_name: "Host".to_string(),
            },
        )
        .await;
    let question_id = match ack {
        Ack::Success { data: Some(q) } => q.id,
        other => panic!("{other:?}"),
    };

    let toggle =
        ClientCommand::MarkAnswered { room_id: "12345".to_string(), question_id };

    let first = hub.handle(host.session_id, toggle.clone()).await;
    match first {
        Ack::Success { data: Some(q) } => {
            assert!(q.answered);
            assert!(q.answered_at_secs.is_some());
        },
        other => panic!("{other:?}"),
    }

    let second = hub.handle(host.session_id, toggle).await;
    match second {
        Ack::Success { data: Some(q) } => {
            assert!(!q.answered);
            assert_eq!(q.answered_at_secs, None);
        },
        other => panic!("{other:?}"),
    }
}

#[tokio::test]
async fn participant_cannot_mark_answered_or_close() {
    let hub = test_hub();
    hub.create_room("12345", "Topic", "u1").unwrap();
    let host = join(&hub, "u1", "12345", Role::Host).await;
    let mut u2 = join(&hub, "u2", "12345", Role::Participant).await;
    let mut host = host;

    let ack = hub
        .handle(
            host.session_id,
            ClientCommand::SubmitQuestion {
                room_id: "12345".to_string(),
                text: "Why?".to_string(),
                author_name: "Host".to_string(),
            },
        )
        .await;
    let question_id = match ack {
        Ack::Success { data: Some(q) } => q.id,
        other => panic!("{other:?}"),
    };
    host.recv_event();
    u2.recv_event();

    let ack = hub
        .handle(
            u2.session_id,
            ClientCommand::MarkAnswered { room_id: "12345".to_string(), question_id },
        )
        .await;
    assert_error(&ack, ErrorKind::Unauthorized);

    let ack = hub
        .handle(u2.session_id, ClientCommand::CloseRoom { room_id: "12345".to_string() })
        .await;
    assert_error(&ack, ErrorKind::Unauthorized);

    // Rejections never broadcast, and the room survives.
    host.assert_silent();
    u2.assert_silent();
    assert!(hub.room_exists("12345").unwrap());
}

#[tokio::test]
async fn host_role_requires_creator_identity() {
    let hub = test_hub();
    hub.create_room("12345", "Topic", "u1").unwrap();

    let impostor = connect(&hub, "u2");
    let ack = hub
        .handle(
            impostor.session_id,
            ClientCommand::JoinRoom { room_id: "12345".to_string(), role: Role::Host },
        )
        .await;
    assert_error(&ack, ErrorKind::Unauthorized);

    // Same identity as the creator is accepted.
    let creator = connect(&hub, "u1");
    let ack = hub
        .handle(
            creator.session_id,
            ClientCommand::JoinRoom { room_id: "12345".to_string(), role: Role::Host },
        )
        .await;
    assert!(ack.is_success());
}

#[tokio::test]
async fn unknown_room_and_unjoined_room_are_rejected() {
    let hub = test_hub();
    hub.create_room("12345", "Topic", "u1").unwrap();

    let client = connect(&hub, "u2");

    let ack = hub
        .handle(
            client.session_id,
            ClientCommand::JoinRoom { room_id: "99999".to_string(), role: Role::Participant },
        )
        .await;
    assert_error(&ack, ErrorKind::NotFound);

    // Joined nowhere: mutations bounce as unauthorized.
    let ack = hub
        .handle(
            client.session_id,
            ClientCommand::Upvote { room_id: "12345".to_string(), question_id: 0 },
        )
        .await;
    assert_error(&ack, ErrorKind::Unauthorized);
}

#[tokio::test]
async fn empty_question_text_is_rejected() {
    let hub = test_hub();
    hub.create_room("12345", "Topic", "u1").unwrap();
    let mut u2 = join(&hub, "u2", "12345", Role::Participant).await;

    let ack = hub
        .handle(
            u2.session_id,
            ClientCommand::SubmitQuestion {
                room_id: "12345".to_string(),
                text: "   ".to_string(),
                author_name: "Bea".to_string(),
            },
        )
        .await;
    assert_error(&ack, ErrorKind::InvalidInput);
    u2.assert_silent();
}

#[tokio::test]
async fn leave_room_stops_broadcasts_to_leaver() {
    let hub = test_hub();
    hub.create_room("12345", "Topic", "u1").unwrap();
    let u2 = join(&hub, "u2", "12345", Role::Participant).await;
    let mut u3 = join(&hub, "u3", "12345", Role::Participant).await;

    let ack = hub
        .handle(u3.session_id, ClientCommand::LeaveRoom { room_id: "12345".to_string() })
        .await;
    assert!(ack.is_success());

    hub.handle(
        u2.session_id,
        ClientCommand::SubmitQuestion {
            room_id: "12345".to_string(),
            text: "Why?".to_string(),
            author_name: "Bea".to_string(),
        },
    )
    .await;

    u3.assert_silent();
}

#[tokio::test]
async fn disconnect_cleans_up_membership() {
    let hub = test_hub();
    hub.create_room("12345", "Topic", "u1").unwrap();
    let u2 = join(&hub, "u2", "12345", Role::Participant).await;
    let mut u3 = join(&hub, "u3", "12345", Role::Participant).await;

    assert_eq!(hub.session_count(), 2);
    hub.disconnect(u2.session_id);
    assert_eq!(hub.session_count(), 1);

    // Disconnect twice is harmless.
    hub.disconnect(u2.session_id);

    hub.handle(
        u3.session_id,
        ClientCommand::SubmitQuestion {
            room_id: "12345".to_string(),
            text: "Why?".to_string(),
            author_name: "Cay".to_string(),
        },
    )
    .await;
    assert!(matches!(u3.recv_event(), Notification::QuestionCreated { .. }));
}

#[tokio::test]
async fn dead_outbox_is_pruned_during_broadcast() {
    let hub = test_hub();
    hub.create_room("12345", "Topic", "u1").unwrap();
    let u2 = join(&hub, "u2", "12345", Role::Participant).await;
    let mut u3 = join(&hub, "u3", "12345", Role::Participant).await;

    // u2's transport died without a disconnect call.
    drop(u2.rx);

    hub.handle(
        u3.session_id,
        ClientCommand::SubmitQuestion {
            room_id: "12345".to_string(),
            text: "Why?".to_string(),
            author_name: "Cay".to_string(),
        },
    )
    .await;

    assert!(matches!(u3.recv_event(), Notification::QuestionCreated { .. }));
    assert_eq!(hub.session_count(), 1);
}

#[tokio::test]
async fn session_capacity_is_enforced() {
    let hub: Arc<TestHub> = Arc::new(Hub::new(
        TestEnv::new(),
        MemoryStore::new(),
        HubConfig { max_sessions: 2, ..Default::default() },
    ));

    let _a = connect(&hub, "u1");
    let _b = connect(&hub, "u2");

    let (tx, _rx) = mpsc::unbounded_channel();
    assert!(hub.connect("u3", tx).is_err());
}

#[tokio::test]
async fn external_delete_room_notifies_members() {
    let hub = test_hub();
    hub.create_room("12345", "Topic", "u1").unwrap();
    let mut u2 = join(&hub, "u2", "12345", Role::Participant).await;

    hub.delete_room("12345").await.unwrap();

    match u2.recv_event() {
        Notification::RoomClosed { room_id, .. } => assert_eq!(room_id, "12345"),
        other => panic!("expected roomClosed, got {other:?}"),
    }
    assert!(!hub.room_exists("12345").unwrap());
    assert!(hub.delete_room("12345").await.is_err());
}

#[tokio::test]
async fn duplicate_room_creation_conflicts() {
    let hub = test_hub();
    hub.create_room("12345", "Topic", "u1").unwrap();

    let err = hub.create_room("12345", "Other", "u2").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}
