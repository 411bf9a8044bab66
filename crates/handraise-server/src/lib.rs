//! Handraise room broadcast server.
//!
//! Real-time Q&A rooms: participants join a room, submit questions, upvote
//! the ones they want answered, and the host marks questions answered or
//! closes the room. Every accepted mutation is broadcast to the room's
//! connected members over WebSocket.
//!
//! # Architecture
//!
//! - [`Hub`]: validates commands, applies them to the store, fans events out
//!   to room members. One instance, `&self` entry points, internally
//!   synchronized with a per-room gate for ordering.
//! - [`RoomRegistry`]: bidirectional session ↔ room membership maps.
//! - [`store::QuestionStore`]: rooms and questions; in-memory, redb-backed,
//!   or fault-injecting.
//! - [`VoteGuard`]: per-question mutation locks plus in-flight vote markers
//!   for idempotence under concurrent duplicates.
//! - [`Environment`]: time and randomness abstraction; [`SystemEnv`] in
//!   production, virtual clocks in tests.
//! - [`ws`]: axum WebSocket/HTTP transport over the hub.

mod env;
mod error;
mod hub;
mod registry;
mod session;
pub mod store;
mod system_env;
mod vote_guard;
pub mod ws;

pub use env::Environment;
pub use error::HubError;
pub use hub::{Hub, HubConfig};
pub use registry::RoomRegistry;
pub use session::Session;
pub use system_env::SystemEnv;
pub use vote_guard::{GuardError, VoteGuard};
