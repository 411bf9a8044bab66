//! Acknowledgements returned for every command.

use serde::{Deserialize, Serialize};

use crate::types::Question;

/// Error taxonomy for rejected operations.
///
/// Every rejection carries one of these kinds plus a human-readable reason.
/// Validation errors resolve at the hub boundary and go to the sender only;
/// they never trigger a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Room or question absent.
    NotFound,
    /// Role mismatch, or operating on a room the sender never joined.
    Unauthorized,
    /// Empty text or malformed identifiers/payload.
    InvalidInput,
    /// Room already exists, or an identical vote is already in flight.
    Conflict,
    /// Vote lock not acquired within the configured interval.
    Timeout,
    /// Storage failure during an already-validated mutation.
    Internal,
}

/// Result of a command, returned to the originating connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Ack {
    /// The operation was applied (and, where applicable, broadcast).
    Success {
        /// The affected question for question-level mutations, absent for
        /// join/leave/close.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<Question>,
    },
    /// The operation was rejected; no state changed, nothing was broadcast.
    Error {
        /// Machine-readable error kind.
        kind: ErrorKind,
        /// Human-readable reason, intended for the UI.
        reason: String,
    },
}

impl Ack {
    /// Success without a payload.
    pub fn ok() -> Self {
        Self::Success { data: None }
    }

    /// Success carrying the affected question.
    pub fn with(question: Question) -> Self {
        Self::Success { data: Some(question) }
    }

    /// Rejection with a kind and reason.
    pub fn error(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self::Error { kind, reason: reason.into() }
    }

    /// Whether this ack reports success.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
