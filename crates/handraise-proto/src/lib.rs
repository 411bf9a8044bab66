//! Wire types for the Handraise realtime Q&A protocol.
//!
//! Everything a client and the server exchange lives here: commands
//! ([`ClientCommand`]), notifications ([`Notification`]), acknowledgements
//! ([`Ack`]) and the shared domain types ([`Room`], [`Question`]).
//!
//! Payloads are JSON tagged unions. The `type` field identifies the variant,
//! so a handler dispatches on one string instead of registering a callback
//! per event name. Clients never send derived state: the server recomputes
//! vote counts from the voter set and ignores any counter a client claims.

mod ack;
mod command;
mod notification;
mod types;

pub use ack::{Ack, ErrorKind};
pub use command::{ClientCommand, ClientMessage};
pub use notification::{Notification, ServerMessage};
pub use types::{Question, Role, Room, VoteDirection};
