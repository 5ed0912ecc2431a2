//! Outbound frame delivered to room members.

use serde::{Deserialize, Serialize};

use crate::ids::{ParticipantId, RoomId};
use crate::routing::derive_receiver;

/// A self-contained message record a client can render without lookups.
///
/// On the wire each frame is one JSON object followed by `\n`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// Room the message was sent into.
    pub room_id: RoomId,
    /// Participant who sent it.
    pub sender_id: ParticipantId,
    /// Derived recipient (empty for rooms that are not two-party).
    pub receiver_id: ParticipantId,
    /// Message body.
    pub message: String,
}

impl OutboundFrame {
    /// Build the frame for `text` sent by `sender` into `room_id`.
    pub fn new(room_id: RoomId, sender_id: ParticipantId, text: impl Into<String>) -> Self {
        let receiver_id = derive_receiver(&room_id, &sender_id);
        Self {
            room_id,
            sender_id,
            receiver_id,
            message: text.into(),
        }
    }

    /// Encode as a newline-terminated JSON line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
