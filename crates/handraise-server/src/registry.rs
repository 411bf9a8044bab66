//! Room registry: transport membership tracking.
//!
//! Maintains bidirectional mappings — room → member sessions (for broadcast
//! fan-out) and session → (room, role) (for validation and disconnect
//! cleanup). A session is in at most one room at a time; joining a new room
//! replaces the previous entry.
//!
//! The registry tracks *transport* membership only. Whether a room exists as
//! a business entity is the caller's job to validate against the question
//! store before joining. Unknown rooms are lazily given an empty member set.
//!
//! All methods take `&self`; the registry owns its synchronization so no
//! caller ever holds ambient global state.

use std::collections::{HashMap, HashSet};

use handraise_proto::Role;
use parking_lot::RwLock;

#[derive(Default)]
struct RegistryInner {
    /// Session → (room, role). One entry per joined session.
    memberships: HashMap<u64, (String, Role)>,
    /// Room → member session set.
    rooms: HashMap<String, HashSet<u64>>,
}

impl RegistryInner {
    /// Detach a session from its current room, if any. Returns the room it
    /// was in. Empty member sets are dropped so closed rooms don't linger.
    fn detach(&mut self, session_id: u64) -> Option<String> {
        let (room_id, _) = self.memberships.remove(&session_id)?;
        if let Some(members) = self.rooms.get_mut(&room_id) {
            members.remove(&session_id);
            if members.is_empty() {
                self.rooms.remove(&room_id);
            }
        }
        Some(room_id)
    }
}

/// Registry of live connections per room.
#[derive(Default)]
pub struct RoomRegistry {
    inner: RwLock<RegistryInner>,
}

impl RoomRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session in a room with a role.
    ///
    /// Idempotent with respect to reconnects: a session that was already in
    /// a room (this one or another) has its prior entry replaced, which
    /// handles reconnect-without-clean-leave. Returns the previously joined
    /// room if it differed from `room_id`.
    pub fn join(&self, room_id: &str, session_id: u64, role: Role) -> Option<String> {
        let mut inner = self.inner.write();

        let previous = inner.detach(session_id).filter(|prior| prior != room_id);

        inner.memberships.insert(session_id, (room_id.to_string(), role));
        inner.rooms.entry(room_id.to_string()).or_default().insert(session_id);

        previous
    }

    /// Remove a session from a room.
    ///
    /// No-op if the session is not a member of that room, so the explicit
    /// leave path and disconnect cleanup can both call it without
    /// double-processing.
    pub fn leave(&self, room_id: &str, session_id: u64) -> bool {
        let mut inner = self.inner.write();

        match inner.memberships.get(&session_id) {
            Some((current, _)) if current == room_id => {
                inner.detach(session_id);
                true
            },
            _ => false,
        }
    }

    /// Remove a session from whatever room it was last in (disconnect
    /// path).
    ///
    /// Returns the room it was removed from; `None` on the second and later
    /// calls, giving exactly-once cleanup semantics even when the explicit
    /// leave raced the disconnect, or the room was closed in between.
    pub fn remove_session(&self, session_id: u64) -> Option<String> {
        self.inner.write().detach(session_id)
    }

    /// Snapshot of the current members of a room.
    ///
    /// Membership is maintained connection-driven, so the snapshot never
    /// contains entries for disconnected sessions.
    pub fn members_of(&self, room_id: &str) -> Vec<u64> {
        self.inner
            .read()
            .rooms
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The room and role a session currently holds.
    pub fn membership(&self, session_id: u64) -> Option<(String, Role)> {
        self.inner.read().memberships.get(&session_id).cloned()
    }

    /// The role a session currently holds, if joined anywhere.
    pub fn role_of(&self, session_id: u64) -> Option<Role> {
        self.inner.read().memberships.get(&session_id).map(|(_, role)| *role)
    }

    /// The room a session is currently joined to.
    pub fn room_of(&self, session_id: u64) -> Option<String> {
        self.inner.read().memberships.get(&session_id).map(|(room, _)| room.clone())
    }

    /// Whether a session is currently a member of a room.
    pub fn is_member(&self, session_id: u64, room_id: &str) -> bool {
        matches!(
            self.inner.read().memberships.get(&session_id),
            Some((current, _)) if current == room_id
        )
    }

    /// Evict every member of a room (room close). Returns the sessions that
    /// were present.
    pub fn clear_room(&self, room_id: &str) -> Vec<u64> {
        let mut inner = self.inner.write();

        let members: Vec<u64> =
            inner.rooms.remove(room_id).map(|set| set.into_iter().collect()).unwrap_or_default();

        for session_id in &members {
            inner.memberships.remove(session_id);
        }

        members
    }

    /// Number of sessions currently joined to any room.
    pub fn joined_count(&self) -> usize {
        self.inner.read().memberships.len()
    }
}
