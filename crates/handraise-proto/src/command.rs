//! Client-originated commands.

use serde::{Deserialize, Serialize};

use crate::types::Role;

/// A command a connection sends to the hub.
///
/// One variant per operation of the event surface. The sender's identity is
/// not part of the payload: it is bound to the connection when the transport
/// is established, so a client cannot vote or submit on behalf of someone
/// else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    /// Enter a room. Joining a new room implicitly leaves the previous one.
    JoinRoom {
        /// Room to join; must exist as a business entity.
        room_id: String,
        /// Requested role. `host` requires the connection identity to match
        /// the room creator.
        role: Role,
    },
    /// Submit a new question to the sender's joined room.
    SubmitQuestion {
        /// Target room; must match the sender's joined room.
        room_id: String,
        /// Question body; must be non-empty after trimming.
        text: String,
        /// Display name to attach to the question.
        author_name: String,
    },
    /// Add the sender to a question's voter set.
    Upvote {
        /// Target room.
        room_id: String,
        /// Target question.
        question_id: u64,
    },
    /// Remove the sender from a question's voter set.
    Downvote {
        /// Target room.
        room_id: String,
        /// Target question.
        question_id: u64,
    },
    /// Flip a question's answered flag. Host only.
    MarkAnswered {
        /// Target room.
        room_id: String,
        /// Target question.
        question_id: u64,
    },
    /// Close the room: delete its questions, notify members, delete the
    /// room. Host only.
    CloseRoom {
        /// Room to close.
        room_id: String,
    },
    /// Leave the room. Acknowledged to the sender only; no broadcast.
    LeaveRoom {
        /// Room to leave.
        room_id: String,
    },
}

impl ClientCommand {
    /// The room this command targets.
    pub fn room_id(&self) -> &str {
        match self {
            Self::JoinRoom { room_id, .. }
            | Self::SubmitQuestion { room_id, .. }
            | Self::Upvote { room_id, .. }
            | Self::Downvote { room_id, .. }
            | Self::MarkAnswered { room_id, .. }
            | Self::CloseRoom { room_id }
            | Self::LeaveRoom { room_id } => room_id,
        }
    }
}

/// Envelope for a command on the wire.
///
/// `seq` is an optional client-chosen correlation number echoed back on the
/// acknowledgement, the transport-agnostic equivalent of a per-event ack
/// callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    /// Correlation number echoed on the ack, if the client wants one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
    /// The command itself.
    #[serde(flatten)]
    pub command: ClientCommand,
}
