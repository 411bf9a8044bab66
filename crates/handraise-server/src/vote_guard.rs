//! Vote idempotence guard.
//!
//! Two defenses around vote application:
//!
//! - An in-flight marker per (room, question, voter, direction): a duplicate
//!   request arriving while the same logical vote is still being processed is
//!   rejected as a conflict instead of applied twice. Markers expire after a
//!   TTL so a crashed request can't wedge a voter forever.
//! - A per-question async mutex serializing the read-modify-write against the
//!   store, acquired with a timeout so a stuck backend surfaces as a timeout
//!   ack rather than an unbounded hang.
//!
//! Generic over the environment's instant type so tests can drive marker
//! expiry with a virtual clock.

use std::{collections::HashMap, sync::Arc, time::Duration};

use dashmap::DashMap;
use handraise_proto::VoteDirection;
use thiserror::Error;

use crate::env::Environment;

/// Errors from the vote guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// The same voter already has the same vote on the same question in
    /// flight. Mapped to a `conflict` ack.
    #[error("identical vote already in flight")]
    VoteInFlight,

    /// The per-question lock could not be acquired within the timeout.
    /// Mapped to a `timeout` ack.
    #[error("timed out waiting for question lock")]
    LockTimeout,
}

/// Identity of one logical vote request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PendingKey {
    room_id: String,
    question_id: u64,
    voter: String,
    direction: VoteDirection,
}

/// Serializes vote mutations per question and deduplicates in-flight votes.
pub struct VoteGuard<I> {
    /// Per-question mutexes, created lazily.
    locks: DashMap<(String, u64), Arc<tokio::sync::Mutex<()>>>,
    /// In-flight vote markers with their expiry instants.
    pending: parking_lot::Mutex<HashMap<PendingKey, I>>,
    pending_ttl: Duration,
    lock_timeout: Duration,
}

impl<I> VoteGuard<I>
where
    I: Copy + Ord + std::ops::Add<Duration, Output = I>,
{
    /// Create a guard with the given marker TTL and lock-acquisition
    /// timeout.
    pub fn new(pending_ttl: Duration, lock_timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            pending: parking_lot::Mutex::new(HashMap::new()),
            pending_ttl,
            lock_timeout,
        }
    }

    /// Mark a vote as in flight.
    ///
    /// Fails with [`GuardError::VoteInFlight`] if an unexpired marker for the
    /// same (room, question, voter, direction) already exists. Expired
    /// markers are pruned on every call, so abandoned requests free their
    /// voter after `pending_ttl`.
    pub fn begin(
        &self,
        now: I,
        room_id: &str,
        question_id: u64,
        voter: &str,
        direction: VoteDirection,
    ) -> Result<(), GuardError> {
        let key = PendingKey {
            room_id: room_id.to_string(),
            question_id,
            voter: voter.to_string(),
            direction,
        };

        let mut pending = self.pending.lock();
        pending.retain(|_, expiry| *expiry > now);

        if pending.contains_key(&key) {
            return Err(GuardError::VoteInFlight);
        }

        pending.insert(key, now + self.pending_ttl);
        Ok(())
    }

    /// Clear a vote's in-flight marker. Safe to call whether or not the vote
    /// succeeded; callers run it on every exit path after [`Self::begin`].
    pub fn finish(&self, room_id: &str, question_id: u64, voter: &str, direction: VoteDirection) {
        let key = PendingKey {
            room_id: room_id.to_string(),
            question_id,
            voter: voter.to_string(),
            direction,
        };

        self.pending.lock().remove(&key);
    }

    /// Run `op` while holding the question's mutation lock.
    ///
    /// Fails with [`GuardError::LockTimeout`] if the lock cannot be acquired
    /// within the configured timeout, leaving the store untouched.
    pub async fn with_lock<E, R>(
        &self,
        env: &E,
        room_id: &str,
        question_id: u64,
        op: impl FnOnce() -> R,
    ) -> Result<R, GuardError>
    where
        E: Environment<Instant = I>,
    {
        let lock =
            self.locks.entry((room_id.to_string(), question_id)).or_default().value().clone();

        tokio::select! {
            guard = lock.lock() => {
                let result = op();
                drop(guard);
                Ok(result)
            },
            () = env.sleep(self.lock_timeout) => Err(GuardError::LockTimeout),
        }
    }

    /// Drop all locks and markers belonging to a room (room close).
    pub fn clear_room(&self, room_id: &str) {
        self.locks.retain(|(room, _), _| room != room_id);
        self.pending.lock().retain(|key, _| key.room_id != room_id);
    }
}
