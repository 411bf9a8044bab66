//! Server-initiated notifications and the outbound wire envelope.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ack::Ack, types::Question};

/// A state change pushed to room members.
///
/// Broadcasts are authoritative: clients reconcile any optimistic local
/// state against these, never the other way around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Notification {
    /// Snapshot of the room's questions, sent to a joining connection only.
    ExistingQuestions {
        /// The joined room.
        room_id: String,
        /// All current questions in creation order, answered included.
        questions: Vec<Question>,
    },
    /// A question was created, with its server-assigned id.
    QuestionCreated {
        /// Owning room.
        room_id: String,
        /// The created question.
        question: Question,
    },
    /// A question's voter set changed.
    VoteUpdated {
        /// Owning room.
        room_id: String,
        /// Affected question.
        question_id: u64,
        /// New derived count, always `voters.len()`.
        upvotes: u32,
        /// New authoritative voter set.
        voters: BTreeSet<String>,
    },
    /// A question's answered flag flipped.
    AnsweredToggled {
        /// Owning room.
        room_id: String,
        /// Affected question.
        question_id: u64,
        /// New flag value.
        answered: bool,
        /// Set when `answered` is true, cleared otherwise.
        answered_at_secs: Option<u64>,
    },
    /// The room was closed; its questions are gone and membership is
    /// cleared after this notice.
    RoomClosed {
        /// The closed room.
        room_id: String,
        /// Human-readable closure notice.
        message: String,
        /// Unix timestamp (seconds) of closure.
        closed_at_secs: u64,
    },
}

/// Outbound envelope: either an acknowledgement of one of the connection's
/// own commands, or a broadcast event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Acknowledgement of a command this connection sent.
    Ack {
        /// Correlation number echoed from the command, if one was given.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seq: Option<u64>,
        /// The outcome.
        #[serde(flatten)]
        ack: Ack,
    },
    /// A broadcast state change.
    Event {
        /// The state change.
        #[serde(flatten)]
        event: Notification,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::ErrorKind;

    #[test]
    fn event_envelope_flattens_notification_tag() {
        let msg = ServerMessage::Event {
            event: Notification::VoteUpdated {
                room_id: "12345".to_string(),
                question_id: 3,
                upvotes: 2,
                voters: BTreeSet::from(["u1".to_string(), "u2".to_string()]),
            },
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["channel"], "event");
        assert_eq!(json["type"], "voteUpdated");
        assert_eq!(json["upvotes"], 2);
    }

    #[test]
    fn ack_envelope_carries_seq_and_status() {
        let msg = ServerMessage::Ack {
            seq: Some(9),
            ack: Ack::error(ErrorKind::NotFound, "room 999 does not exist"),
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["channel"], "ack");
        assert_eq!(json["seq"], 9);
        assert_eq!(json["status"], "error");
    }

    #[test]
    fn room_closed_round_trips() {
        let msg = ServerMessage::Event {
            event: Notification::RoomClosed {
                room_id: "12345".to_string(),
                message: "room closed by host".to_string(),
                closed_at_secs: 1_700_000_123,
            },
        };

        let json = serde_json::to_string(&msg).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }
}
