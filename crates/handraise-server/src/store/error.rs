//! Question store error types.

use thiserror::Error;

/// Errors from question store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Room does not exist. The caller maps this to a `notFound` ack.
    #[error("room not found: {0}")]
    RoomNotFound(String),

    /// Question does not exist in the given room.
    #[error("question {question_id} not found in room {room_id}")]
    QuestionNotFound {
        /// Owning room.
        room_id: String,
        /// Requested question id.
        question_id: u64,
    },

    /// Room id already taken on create.
    #[error("room already exists: {0}")]
    RoomAlreadyExists(String),

    /// Question text was empty after trimming.
    #[error("question text must not be empty")]
    EmptyText,

    /// Record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend I/O failure. Surfaced to callers as `internal`; never
    /// partially broadcast.
    #[error("io error: {0}")]
    Io(String),
}
