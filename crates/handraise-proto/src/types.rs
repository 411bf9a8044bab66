//! Domain types shared by commands, notifications and storage.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Role of a connection within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May mark questions answered and close the room.
    Host,
    /// May submit questions and vote.
    Participant,
}

/// Direction of a vote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    /// Add the voter to the question's voter set.
    Up,
    /// Remove the voter from the question's voter set.
    Down,
}

/// A named collaborative session scoping questions and members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Operator-chosen identifier, globally unique (e.g. a short numeric
    /// code).
    pub id: String,
    /// Free-text topic shown to participants.
    pub topic: String,
    /// Opaque identity of the creator; the only identity allowed to join
    /// with [`Role::Host`].
    pub creator_identity: String,
    /// Unix timestamp (seconds) of creation.
    pub created_at_secs: u64,
}

/// A submitted question ("doubt") scoped to one room.
///
/// # Invariants
///
/// - `upvotes == voters.len()` at all times. The count is a derived cache of
///   the set and is recomputed by the store on every vote mutation; it is
///   never trusted from a client.
/// - `answered_at_secs` is `Some` exactly when `answered` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    /// Identifier, unique within the owning room, assigned monotonically in
    /// creation order.
    pub id: u64,
    /// Owning room.
    pub room_id: String,
    /// Question body.
    pub text: String,
    /// Display name the author submitted with.
    pub author_name: String,
    /// Opaque stable identity of the author.
    pub author_identity: String,
    /// Derived vote count; always equals `voters.len()`.
    pub upvotes: u32,
    /// The authoritative record of who has upvoted. Membership, not
    /// sequence.
    pub voters: BTreeSet<String>,
    /// Whether the host has marked this question answered.
    pub answered: bool,
    /// Unix timestamp (seconds) of the false→true transition; cleared on
    /// true→false.
    pub answered_at_secs: Option<u64>,
    /// Unix timestamp (seconds) of creation.
    pub created_at_secs: u64,
}
