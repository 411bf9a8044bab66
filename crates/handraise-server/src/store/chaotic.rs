//! Chaotic store wrapper for fault injection testing.
//!
//! Store wrapper that randomly fails operations to verify the hub surfaces
//! storage failures as `internal` acks and never broadcasts a mutation that
//! did not persist.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{Arc, Mutex};

use handraise_proto::{Question, Room, VoteDirection};

use super::{QuestionStore, StoreError};

/// Simple deterministic RNG for chaos injection.
///
/// Linear congruential generator, so chaos runs are reproducible with the
/// same seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next random value in [0.0, 1.0).
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }

    fn should_fail(&mut self, failure_rate: f64) -> bool {
        self.next() < failure_rate
    }
}

/// Store wrapper that randomly injects failures.
///
/// Delegates to an underlying store but fails operations with the configured
/// probability before they reach it, so an injected failure never mutates
/// state. Uses `Arc<Mutex<>>` for the RNG state, making it Clone and
/// thread-safe.
#[derive(Clone)]
pub struct ChaoticStore<S: QuestionStore> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail).
    failure_rate: f64,
    /// RNG state for deterministic chaos.
    rng: Arc<Mutex<ChaoticRng>>,
}

impl<S: QuestionStore> ChaoticStore<S> {
    /// Create a new chaotic store wrapper with a fixed default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0].
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0].
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self { inner, failure_rate, rng: Arc::new(Mutex::new(ChaoticRng::new(seed))) }
    }

    /// Underlying store (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn should_fail(&self) -> bool {
        #[allow(clippy::expect_used)]
        self.rng.lock().expect("ChaoticRng mutex poisoned").should_fail(self.failure_rate)
    }

    fn maybe_fail(&self) -> Result<(), StoreError> {
        if self.should_fail() {
            return Err(StoreError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: QuestionStore> QuestionStore for ChaoticStore<S> {
    fn create_room(&self, room: &Room) -> Result<(), StoreError> {
        self.maybe_fail()?;
        self.inner.create_room(room)
    }

    fn room(&self, room_id: &str) -> Result<Option<Room>, StoreError> {
        self.maybe_fail()?;
        self.inner.room(room_id)
    }

    fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        self.maybe_fail()?;
        self.inner.list_rooms()
    }

    fn delete_room(&self, room_id: &str) -> Result<bool, StoreError> {
        self.maybe_fail()?;
        self.inner.delete_room(room_id)
    }

    fn create_question(
        &self,
        room_id: &str,
        text: &str,
        author_identity: &str,
        author_name: &str,
        created_at_secs: u64,
    ) -> Result<Question, StoreError> {
        self.maybe_fail()?;
        self.inner.create_question(room_id, text, author_identity, author_name, created_at_secs)
    }

    fn questions(
        &self,
        room_id: &str,
        include_answered: bool,
    ) -> Result<Vec<Question>, StoreError> {
        self.maybe_fail()?;
        self.inner.questions(room_id, include_answered)
    }

    fn question(&self, room_id: &str, question_id: u64) -> Result<Option<Question>, StoreError> {
        self.maybe_fail()?;
        self.inner.question(room_id, question_id)
    }

    fn apply_vote(
        &self,
        room_id: &str,
        question_id: u64,
        voter: &str,
        direction: VoteDirection,
    ) -> Result<Question, StoreError> {
        self.maybe_fail()?;
        self.inner.apply_vote(room_id, question_id, voter, direction)
    }

    fn toggle_answered(
        &self,
        room_id: &str,
        question_id: u64,
        now_secs: u64,
    ) -> Result<Question, StoreError> {
        self.maybe_fail()?;
        self.inner.toggle_answered(room_id, question_id, now_secs)
    }

    fn delete_questions(&self, room_id: &str) -> Result<usize, StoreError> {
        self.maybe_fail()?;
        self.inner.delete_questions(room_id)
    }
}
