//! In-memory store for tests and `--db`-less runs.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::{Arc, Mutex},
};

use handraise_proto::{Question, Room, VoteDirection};

use super::{QuestionStore, StoreError};

/// Per-room question log with a monotonic id allocator.
#[derive(Default)]
struct RoomQuestions {
    next_id: u64,
    /// Keyed by id; `BTreeMap` iteration gives creation order for free.
    by_id: BTreeMap<u64, Question>,
}

struct MemoryStoreInner {
    rooms: HashMap<String, Room>,
    questions: HashMap<String, RoomQuestions>,
}

/// In-memory [`QuestionStore`].
///
/// State is wrapped in `Arc<Mutex<_>>` so clones share storage. Uses
/// `lock().expect()`, which panics if the mutex is poisoned — acceptable for
/// test and development use.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                rooms: HashMap::new(),
                questions: HashMap::new(),
            })),
        }
    }

    /// Number of rooms currently stored. Useful in tests.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn room_count(&self) -> usize {
        self.inner.lock().expect("mutex poisoned").rooms.len()
    }

    /// Total questions across all rooms. Useful in tests.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn total_question_count(&self) -> usize {
        let inner = self.inner.lock().expect("mutex poisoned");
        inner.questions.values().map(|room| room.by_id.len()).sum()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Recompute the derived count from the voter set.
fn refresh_upvotes(question: &mut Question) {
    question.upvotes = question.voters.len() as u32;
}

#[allow(clippy::expect_used)]
impl QuestionStore for MemoryStore {
    fn create_room(&self, room: &Room) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("mutex poisoned");

        if inner.rooms.contains_key(&room.id) {
            return Err(StoreError::RoomAlreadyExists(room.id.clone()));
        }

        inner.rooms.insert(room.id.clone(), room.clone());
        Ok(())
    }

    fn room(&self, room_id: &str) -> Result<Option<Room>, StoreError> {
        Ok(self.inner.lock().expect("mutex poisoned").rooms.get(room_id).cloned())
    }

    fn list_rooms(&self) -> Result<Vec<Room>, StoreError> {
        Ok(self.inner.lock().expect("mutex poisoned").rooms.values().cloned().collect())
    }

    fn delete_room(&self, room_id: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().expect("mutex poisoned").rooms.remove(room_id).is_some())
    }

    fn create_question(
        &self,
        room_id: &str,
        text: &str,
        author_identity: &str,
        author_name: &str,
        created_at_secs: u64,
    ) -> Result<Question, StoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StoreError::EmptyText);
        }

        let mut inner = self.inner.lock().expect("mutex poisoned");

        if !inner.rooms.contains_key(room_id) {
            return Err(StoreError::RoomNotFound(room_id.to_string()));
        }

        let room = inner.questions.entry(room_id.to_string()).or_default();
        let id = room.next_id;
        room.next_id += 1;

        let question = Question {
            id,
            room_id: room_id.to_string(),
            text: text.to_string(),
            author_name: author_name.to_string(),
            author_identity: author_identity.to_string(),
            upvotes: 0,
            voters: BTreeSet::new(),
            answered: false,
            answered_at_secs: None,
            created_at_secs,
        };

        room.by_id.insert(id, question.clone());
        Ok(question)
    }

    fn questions(
        &self,
        room_id: &str,
        include_answered: bool,
    ) -> Result<Vec<Question>, StoreError> {
        let inner = self.inner.lock().expect("mutex poisoned");

        if !inner.rooms.contains_key(room_id) {
            return Err(StoreError::RoomNotFound(room_id.to_string()));
        }

        Ok(inner
            .questions
            .get(room_id)
            .map(|room| {
                room.by_id
                    .values()
                    .filter(|q| include_answered || !q.answered)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn question(&self, room_id: &str, question_id: u64) -> Result<Option<Question>, StoreError> {
        let inner = self.inner.lock().expect("mutex poisoned");
        Ok(inner.questions.get(room_id).and_then(|room| room.by_id.get(&question_id)).cloned())
    }

    fn apply_vote(
        &self,
        room_id: &str,
        question_id: u64,
        voter: &str,
        direction: VoteDirection,
    ) -> Result<Question, StoreError> {
        let mut inner = self.inner.lock().expect("mutex poisoned");

        let question = inner
            .questions
            .get_mut(room_id)
            .and_then(|room| room.by_id.get_mut(&question_id))
            .ok_or_else(|| StoreError::QuestionNotFound {
                room_id: room_id.to_string(),
                question_id,
            })?;

        match direction {
            VoteDirection::Up => question.voters.insert(voter.to_string()),
            VoteDirection::Down => question.voters.remove(voter),
        };

        refresh_upvotes(question);
        Ok(question.clone())
    }

    fn toggle_answered(
        &self,
        room_id: &str,
        question_id: u64,
        now_secs: u64,
    ) -> Result<Question, StoreError> {
        let mut inner = self.inner.lock().expect("mutex poisoned");

        let question = inner
            .questions
            .get_mut(room_id)
            .and_then(|room| room.by_id.get_mut(&question_id))
            .ok_or_else(|| StoreError::QuestionNotFound {
                room_id: room_id.to_string(),
                question_id,
            })?;

        question.answered = !question.answered;
        question.answered_at_secs = question.answered.then_some(now_secs);

        Ok(question.clone())
    }

    fn delete_questions(&self, room_id: &str) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().expect("mutex poisoned");
        Ok(inner.questions.remove(room_id).map_or(0, |room| room.by_id.len()))
    }
}
