//! The room broadcast hub.
//!
//! - [`ClientConnection`] / [`Mailbox`]: a participant's bounded outbound queue
//! - [`Room`]: one task per room serializing membership and fan-out
//! - [`RoomRegistry`]: lazily creates exactly one room per id
//!
//! Connections refer to rooms by id only; rooms hold `Arc<ClientConnection>`
//! for their members. There is no back-pointer from connection to room.

pub mod connection;
pub mod registry;
pub mod room;

use huddle_core::RoomId;
use thiserror::Error;

pub use connection::{ClientConnection, Delivery, Mailbox};
pub use registry::RoomRegistry;
pub use room::Room;

/// Errors submitting to a room.
#[derive(Debug, Error)]
pub enum HubError {
    /// The room's task is gone (runtime shutting down).
    #[error("room {0} is no longer running")]
    RoomClosed(RoomId),
}
