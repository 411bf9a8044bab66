//! Hub error type and its mapping onto wire error kinds.

use handraise_proto::{Ack, ErrorKind};

use crate::{store::StoreError, vote_guard::GuardError};

/// A rejected command: the wire-level error kind plus a human-readable
/// reason. Converted into an error ack for the issuing session; rejected
/// commands never broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubError {
    /// Machine-readable classification sent on the wire.
    pub kind: ErrorKind,
    /// Human-readable detail for the client.
    pub reason: String,
}

impl HubError {
    /// Construct an error with the given kind and reason.
    pub fn new(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self { kind, reason: reason.into() }
    }

    /// A `notFound` error.
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, reason)
    }

    /// An `unauthorized` error.
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, reason)
    }

    /// An `invalidInput` error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, reason)
    }

    /// A `conflict` error.
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, reason)
    }

    /// The error ack for this rejection.
    pub fn to_ack(&self) -> Ack {
        Ack::error(self.kind, self.reason.clone())
    }
}

impl std::fmt::Display for HubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.reason)
    }
}

impl std::error::Error for HubError {}

impl From<StoreError> for HubError {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::RoomNotFound(_) | StoreError::QuestionNotFound { .. } => {
                ErrorKind::NotFound
            },
            StoreError::RoomAlreadyExists(_) => ErrorKind::Conflict,
            StoreError::EmptyText => ErrorKind::InvalidInput,
            StoreError::Serialization(_) | StoreError::Io(_) => ErrorKind::Internal,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<GuardError> for HubError {
    fn from(err: GuardError) -> Self {
        let kind = match err {
            GuardError::VoteInFlight => ErrorKind::Conflict,
            GuardError::LockTimeout => ErrorKind::Timeout,
        };
        Self::new(kind, err.to_string())
    }
}
