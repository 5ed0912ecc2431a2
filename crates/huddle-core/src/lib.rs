//! # huddle-core
//!
//! Foundation types shared by every Huddle crate.
//!
//! - **Ids**: [`ids::ParticipantId`] and [`ids::RoomId`] as string newtypes
//! - **Envelopes**: [`envelope::Envelope`], the inbound join/leave/message intent
//! - **Frames**: [`frame::OutboundFrame`], the newline-terminated JSON record
//!   delivered to each member of a room
//! - **Routing**: [`routing::derive_receiver`] for two-participant room ids
//! - **Messages**: [`message::ChatMessage`], the persisted form of a frame
//! - **Logging**: [`logging::init_subscriber`]
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other huddle crates.

#![deny(unsafe_code)]

pub mod envelope;
pub mod frame;
pub mod ids;
pub mod logging;
pub mod message;
pub mod routing;

pub use envelope::{Envelope, EnvelopeError};
pub use frame::OutboundFrame;
pub use ids::{ParticipantId, RoomId};
pub use message::ChatMessage;
