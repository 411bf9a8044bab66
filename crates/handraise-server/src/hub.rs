//! Central hub: validates commands, applies them to the store, and fans
//! state changes out to room members.
//!
//! One hub instance serves every connection. All entry points take `&self`;
//! each component owns its synchronization, so handlers for different
//! sessions run concurrently.
//!
//! Per-room ordering is enforced with a gate mutex per room: a mutation
//! holds its room's gate across validate → persist → broadcast, so two
//! mutations of the same room broadcast in the order they were applied and
//! a joining session's snapshot is never torn by a concurrent mutation.
//! Different rooms proceed independently. Nothing is broadcast unless the
//! store mutation succeeded.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use handraise_proto::{
    Ack, ClientCommand, Notification, Role, Room, ServerMessage, VoteDirection,
};
use tokio::sync::mpsc;

use crate::{
    env::Environment,
    error::HubError,
    registry::RoomRegistry,
    session::Session,
    store::QuestionStore,
    vote_guard::VoteGuard,
};

/// Hub tuning knobs.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// How long an in-flight vote marker lives before an abandoned request
    /// stops blocking its voter.
    pub vote_pending_ttl: Duration,
    /// How long a vote waits for its question's mutation lock before being
    /// rejected with a timeout.
    pub vote_lock_timeout: Duration,
    /// Maximum concurrently connected sessions.
    pub max_sessions: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            vote_pending_ttl: Duration::from_secs(10),
            vote_lock_timeout: Duration::from_secs(5),
            max_sessions: 10_000,
        }
    }
}

/// The room broadcast hub.
///
/// Generic over the environment (time, randomness) and the question store,
/// so tests can run it against a virtual clock and an in-memory or
/// fault-injecting backend.
pub struct Hub<E: Environment, S: QuestionStore> {
    env: E,
    store: S,
    registry: RoomRegistry,
    sessions: DashMap<u64, Session>,
    /// Per-room broadcast gates, created lazily and dropped on room close.
    gates: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
    guard: VoteGuard<E::Instant>,
    config: HubConfig,
}

impl<E: Environment, S: QuestionStore> Hub<E, S> {
    /// Create a hub over the given environment and store.
    pub fn new(env: E, store: S, config: HubConfig) -> Self {
        let guard = VoteGuard::new(config.vote_pending_ttl, config.vote_lock_timeout);
        Self {
            env,
            store,
            registry: RoomRegistry::new(),
            sessions: DashMap::new(),
            gates: DashMap::new(),
            guard,
            config,
        }
    }

    /// Register a new connection with its bound identity and outbox.
    ///
    /// Returns the unguessable session id the transport uses for all
    /// subsequent calls. Fails when the session capacity is reached.
    pub fn connect(
        &self,
        identity: impl Into<String>,
        outbox: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<u64, HubError> {
        if self.sessions.len() >= self.config.max_sessions {
            return Err(HubError::conflict("session capacity reached"));
        }

        let mut session_id = self.env.random_u64();
        while self.sessions.contains_key(&session_id) {
            session_id = self.env.random_u64();
        }

        self.sessions.insert(session_id, Session::new(session_id, identity.into(), outbox));

        tracing::debug!(session_id, "session connected");
        Ok(session_id)
    }

    /// Tear down a connection: drop its session and its room membership.
    ///
    /// Idempotent; the transport calls it once on socket close, and
    /// broadcast-time pruning may have beaten it to the cleanup.
    pub fn disconnect(&self, session_id: u64) {
        self.sessions.remove(&session_id);
        if let Some(room_id) = self.registry.remove_session(session_id) {
            tracing::debug!(session_id, %room_id, "session left room on disconnect");
        }
    }

    /// Number of currently connected sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Handle one command from a connected session.
    ///
    /// Always produces an ack for the sender; rejections never mutate state
    /// or broadcast.
    pub async fn handle(&self, session_id: u64, command: ClientCommand) -> Ack {
        let result = match command {
            ClientCommand::JoinRoom { room_id, role } => {
                self.join_room(session_id, &room_id, role).await
            },
            ClientCommand::SubmitQuestion { room_id, text, author_name } => {
                self.submit_question(session_id, &room_id, &text, &author_name).await
            },
            ClientCommand::Upvote { room_id, question_id } => {
                self.vote(session_id, &room_id, question_id, VoteDirection::Up).await
            },
            ClientCommand::Downvote { room_id, question_id } => {
                self.vote(session_id, &room_id, question_id, VoteDirection::Down).await
            },
            ClientCommand::MarkAnswered { room_id, question_id } => {
                self.mark_answered(session_id, &room_id, question_id).await
            },
            ClientCommand::CloseRoom { room_id } => self.close_room(session_id, &room_id).await,
            ClientCommand::LeaveRoom { room_id } => self.leave_room(session_id, &room_id),
        };

        match result {
            Ok(ack) => ack,
            Err(err) => {
                tracing::debug!(session_id, %err, "command rejected");
                err.to_ack()
            },
        }
    }

    async fn join_room(
        &self,
        session_id: u64,
        room_id: &str,
        role: Role,
    ) -> Result<Ack, HubError> {
        let identity = self.session_identity(session_id)?;

        let room = self
            .store
            .room(room_id)?
            .ok_or_else(|| HubError::not_found(format!("room {room_id} does not exist")))?;

        if role == Role::Host && identity != room.creator_identity {
            return Err(HubError::unauthorized("host role is reserved for the room creator"));
        }

        let gate = self.gate(room_id);
        let _guard = gate.lock().await;

        let questions = self.store.questions(room_id, true)?;

        if let Some(previous) = self.registry.join(room_id, session_id, role) {
            tracing::debug!(session_id, %previous, %room_id, "session switched rooms");
        }

        // Snapshot goes to the joining connection only; inside the gate it
        // cannot be torn by a concurrent mutation of this room.
        self.send_to(
            session_id,
            ServerMessage::Event {
                event: Notification::ExistingQuestions {
                    room_id: room_id.to_string(),
                    questions,
                },
            },
        );

        Ok(Ack::ok())
    }

    async fn submit_question(
        &self,
        session_id: u64,
        room_id: &str,
        text: &str,
        author_name: &str,
    ) -> Result<Ack, HubError> {
        let (identity, _) = self.require_member(session_id, room_id)?;

        if text.trim().is_empty() {
            return Err(HubError::invalid_input("question text must not be empty"));
        }

        let gate = self.gate(room_id);
        let _guard = gate.lock().await;

        let question = self.store.create_question(
            room_id,
            text,
            &identity,
            author_name,
            self.env.wall_clock_secs(),
        )?;

        self.broadcast(
            room_id,
            Notification::QuestionCreated {
                room_id: room_id.to_string(),
                question: question.clone(),
            },
        );

        Ok(Ack::with(question))
    }

    async fn vote(
        &self,
        session_id: u64,
        room_id: &str,
        question_id: u64,
        direction: VoteDirection,
    ) -> Result<Ack, HubError> {
        let (identity, _) = self.require_member(session_id, room_id)?;

        let gate = self.gate(room_id);
        let _guard = gate.lock().await;

        self.guard.begin(self.env.now(), room_id, question_id, &identity, direction)?;

        let outcome = self
            .guard
            .with_lock(&self.env, room_id, question_id, || {
                self.store.apply_vote(room_id, question_id, &identity, direction)
            })
            .await;

        // Marker cleared on every path once the mutation attempt is over.
        self.guard.finish(room_id, question_id, &identity, direction);

        let question = outcome??;

        self.broadcast(
            room_id,
            Notification::VoteUpdated {
                room_id: room_id.to_string(),
                question_id,
                upvotes: question.upvotes,
                voters: question.voters.clone(),
            },
        );

        Ok(Ack::with(question))
    }

    async fn mark_answered(
        &self,
        session_id: u64,
        room_id: &str,
        question_id: u64,
    ) -> Result<Ack, HubError> {
        let (_, role) = self.require_member(session_id, room_id)?;
        if role != Role::Host {
            return Err(HubError::unauthorized("only the host may mark questions answered"));
        }

        let gate = self.gate(room_id);
        let _guard = gate.lock().await;

        let question =
            self.store.toggle_answered(room_id, question_id, self.env.wall_clock_secs())?;

        self.broadcast(
            room_id,
            Notification::AnsweredToggled {
                room_id: room_id.to_string(),
                question_id,
                answered: question.answered,
                answered_at_secs: question.answered_at_secs,
            },
        );

        Ok(Ack::with(question))
    }

    async fn close_room(&self, session_id: u64, room_id: &str) -> Result<Ack, HubError> {
        let (_, role) = self.require_member(session_id, room_id)?;
        if role != Role::Host {
            return Err(HubError::unauthorized("only the host may close the room"));
        }

        self.close_room_inner(room_id, "room closed by host").await
    }

    fn leave_room(&self, session_id: u64, room_id: &str) -> Result<Ack, HubError> {
        self.require_member(session_id, room_id)?;
        self.registry.leave(room_id, session_id);
        tracing::debug!(session_id, %room_id, "session left room");
        Ok(Ack::ok())
    }

    /// Create a room on behalf of an external caller (HTTP surface).
    ///
    /// The creator's identity becomes the only identity allowed to join as
    /// host.
    pub fn create_room(
        &self,
        room_id: &str,
        topic: &str,
        creator_identity: &str,
    ) -> Result<Room, HubError> {
        if room_id.trim().is_empty() {
            return Err(HubError::invalid_input("room id must not be empty"));
        }
        if topic.trim().is_empty() {
            return Err(HubError::invalid_input("topic must not be empty"));
        }
        if creator_identity.trim().is_empty() {
            return Err(HubError::invalid_input("creator identity must not be empty"));
        }

        let room = Room {
            id: room_id.trim().to_string(),
            topic: topic.trim().to_string(),
            creator_identity: creator_identity.trim().to_string(),
            created_at_secs: self.env.wall_clock_secs(),
        };

        self.store.create_room(&room)?;
        tracing::info!(room_id = %room.id, "room created");

        Ok(room)
    }

    /// Whether a room exists as a business entity.
    pub fn room_exists(&self, room_id: &str) -> Result<bool, HubError> {
        Ok(self.store.room_exists(room_id)?)
    }

    /// Delete a room on behalf of an external caller, with the same cascade
    /// and notifications as a host-issued close.
    pub async fn delete_room(&self, room_id: &str) -> Result<(), HubError> {
        self.close_room_inner(room_id, "room deleted").await?;
        Ok(())
    }

    /// Close cascade: delete questions, delete the room, notify members,
    /// evict membership, drop per-room guard state.
    async fn close_room_inner(&self, room_id: &str, message: &str) -> Result<Ack, HubError> {
        let gate = self.gate(room_id);
        let _guard = gate.lock().await;

        if !self.store.room_exists(room_id)? {
            return Err(HubError::not_found(format!("room {room_id} does not exist")));
        }

        let deleted = self.store.delete_questions(room_id)?;
        self.store.delete_room(room_id)?;

        self.broadcast(
            room_id,
            Notification::RoomClosed {
                room_id: room_id.to_string(),
                message: message.to_string(),
                closed_at_secs: self.env.wall_clock_secs(),
            },
        );

        let evicted = self.registry.clear_room(room_id);
        self.guard.clear_room(room_id);
        self.gates.remove(room_id);

        tracing::info!(%room_id, deleted, evicted = evicted.len(), "room closed");

        Ok(Ack::ok())
    }

    /// The gate serializing mutations and joins of one room.
    fn gate(&self, room_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.gates.entry(room_id.to_string()).or_default().value().clone()
    }

    fn session_identity(&self, session_id: u64) -> Result<String, HubError> {
        self.sessions
            .get(&session_id)
            .map(|session| session.identity.clone())
            .ok_or_else(|| HubError::unauthorized("unknown session"))
    }

    /// The sender's identity and role, provided it is a member of `room_id`.
    fn require_member(
        &self,
        session_id: u64,
        room_id: &str,
    ) -> Result<(String, Role), HubError> {
        let identity = self.session_identity(session_id)?;

        match self.registry.membership(session_id) {
            Some((room, role)) if room == room_id => Ok((identity, role)),
            _ => Err(HubError::unauthorized(format!("not a member of room {room_id}"))),
        }
    }

    /// Deliver a message to one session, pruning it if its outbox is dead.
    fn send_to(&self, session_id: u64, message: ServerMessage) {
        let delivered = match self.sessions.get(&session_id) {
            Some(session) => session.send(message),
            None => false,
        };

        if !delivered {
            self.prune(session_id);
        }
    }

    /// Fan an event out to every current member of a room.
    ///
    /// Delivery is non-blocking: messages are queued on each session's
    /// outbox. A session whose outbox is gone is pruned on the spot, so one
    /// dead connection never stalls the rest of the room.
    fn broadcast(&self, room_id: &str, event: Notification) {
        let message = ServerMessage::Event { event };

        for session_id in self.registry.members_of(room_id) {
            self.send_to(session_id, message.clone());
        }
    }

    fn prune(&self, session_id: u64) {
        self.sessions.remove(&session_id);
        if self.registry.remove_session(session_id).is_some() {
            tracing::debug!(session_id, "pruned dead session");
        }
    }
}
