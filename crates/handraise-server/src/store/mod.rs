//! Storage abstraction for rooms and questions.
//!
//! Trait-based so the hub can run against an in-memory map in tests, a
//! durable redb file in production, and a fault-injecting wrapper in chaos
//! tests. The trait is synchronous; implementations share internal state via
//! `Arc`, so clones access the same underlying storage.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStore;
pub use error::StoreError;
use handraise_proto::{Question, Room, VoteDirection};
pub use memory::MemoryStore;

pub use self::redb::RedbStore;

/// Durable record of rooms and their questions.
///
/// Must be `Clone` (shared with the hub and the runtime), `Send + Sync`,
/// and synchronous.
///
/// # Invariants
///
/// - Question ids are unique within their room and assigned in creation
///   order, so id order is creation order.
/// - `upvotes == voters.len()` on every question an implementation returns;
///   the count is recomputed from the set on each vote mutation.
/// - `answered_at_secs` is `Some` exactly when `answered` is true.
pub trait QuestionStore: Clone + Send + Sync + 'static {
    /// Create a room.
    ///
    /// Fails with [`StoreError::RoomAlreadyExists`] if the id is taken.
    fn create_room(&self, room: &Room) -> Result<(), StoreError>;

    /// Load a room. `None` if absent.
    fn room(&self, room_id: &str) -> Result<Option<Room>, StoreError>;

    /// Whether a room exists as a business entity.
    fn room_exists(&self, room_id: &str) -> Result<bool, StoreError> {
        Ok(self.room(room_id)?.is_some())
    }

    /// All rooms, in no guaranteed order. Used for startup recovery
    /// logging.
    fn list_rooms(&self) -> Result<Vec<Room>, StoreError>;

    /// Delete a room record. Returns whether it existed. Does not touch the
    /// room's questions; callers run [`Self::delete_questions`] first.
    fn delete_room(&self, room_id: &str) -> Result<bool, StoreError>;

    /// Create a question with a fresh id, zero votes, and
    /// `answered = false`.
    ///
    /// Fails with [`StoreError::EmptyText`] if `text` trims to nothing and
    /// [`StoreError::RoomNotFound`] if the room is absent.
    fn create_question(
        &self,
        room_id: &str,
        text: &str,
        author_identity: &str,
        author_name: &str,
        created_at_secs: u64,
    ) -> Result<Question, StoreError>;

    /// Questions of a room in creation order (id ascending).
    ///
    /// With `include_answered = false`, answered questions are filtered
    /// out. Fails with [`StoreError::RoomNotFound`] if the room is absent.
    fn questions(&self, room_id: &str, include_answered: bool)
    -> Result<Vec<Question>, StoreError>;

    /// Load one question. `None` if absent (room present).
    fn question(&self, room_id: &str, question_id: u64) -> Result<Option<Question>, StoreError>;

    /// Add or remove `voter` from a question's voter set and recompute the
    /// count.
    ///
    /// Requesting a direction that is already satisfied (upvote while
    /// present, downvote while absent) is a silent no-op returning the
    /// unchanged question — not an error.
    fn apply_vote(
        &self,
        room_id: &str,
        question_id: u64,
        voter: &str,
        direction: VoteDirection,
    ) -> Result<Question, StoreError>;

    /// Flip a question's answered flag; sets `answered_at_secs = now_secs`
    /// on false→true and clears it on true→false.
    fn toggle_answered(
        &self,
        room_id: &str,
        question_id: u64,
        now_secs: u64,
    ) -> Result<Question, StoreError>;

    /// Delete all questions of a room (room close). Returns the number
    /// deleted; zero for an unknown or empty room.
    fn delete_questions(&self, room_id: &str) -> Result<usize, StoreError>;
}
