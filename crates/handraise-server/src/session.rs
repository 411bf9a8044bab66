//! Connected client session.

use handraise_proto::ServerMessage;
use tokio::sync::mpsc;

/// One connected client: its authenticated identity and the outbox the
/// transport drains into the socket.
///
/// The identity is bound once at connection time. Every command the session
/// sends acts as this identity; identities never travel in command payloads,
/// so a client cannot vote or author on someone else's behalf.
#[derive(Debug, Clone)]
pub struct Session {
    /// Unguessable random id assigned at connect.
    pub id: u64,
    /// Stable client identity (voter identity, question authorship).
    pub identity: String,
    outbox: mpsc::UnboundedSender<ServerMessage>,
}

impl Session {
    /// Create a session with its outbox channel.
    pub fn new(id: u64, identity: String, outbox: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { id, identity, outbox }
    }

    /// Queue a message for delivery. Returns false if the receiving half is
    /// gone, which means the connection is dead and the session should be
    /// pruned.
    pub fn send(&self, message: ServerMessage) -> bool {
        self.outbox.send(message).is_ok()
    }
}
