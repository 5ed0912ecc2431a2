//! Room directory: which rooms a participant belongs to, and who is in them.
//!
//! The directory only answers lookups at session start and for the room
//! listing endpoint. Live membership is owned by the hub.

pub mod memory;
pub mod redis;

use std::collections::BTreeMap;

use async_trait::async_trait;
use huddle_core::{ParticipantId, RoomId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use self::memory::MemoryRoomDirectory;
pub use self::redis::RedisRoomDirectory;

/// Errors looking up rooms.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The Redis backend failed.
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
}

/// Display data for one participant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantProfile {
    /// Display name.
    #[serde(default)]
    pub username: String,
    /// Avatar image URL.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A room a participant belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomRecord {
    /// Room id used on the wire.
    pub room_id: RoomId,
    /// Profiles of the room's participants, keyed by id.
    pub participants: BTreeMap<ParticipantId, ParticipantProfile>,
}

impl RoomRecord {
    /// A record with no profile data.
    pub fn bare(room_id: RoomId) -> Self {
        Self {
            room_id,
            participants: BTreeMap::new(),
        }
    }

    /// Add a participant profile.
    #[must_use]
    pub fn with_participant(mut self, id: impl Into<ParticipantId>, profile: ParticipantProfile) -> Self {
        let _ = self.participants.insert(id.into(), profile);
        self
    }

    /// First participant other than `me`, in id order.
    pub fn counterpart(&self, me: &ParticipantId) -> Option<(&ParticipantId, &ParticipantProfile)> {
        self.participants.iter().find(|(id, _)| *id != me)
    }
}

/// Source of a participant's rooms.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    /// Rooms `participant` belongs to, in directory order.
    async fn rooms_for(&self, participant: &ParticipantId) -> Result<Vec<RoomRecord>, DirectoryError>;
}
