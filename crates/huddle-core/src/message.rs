//! Persisted chat message record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::frame::OutboundFrame;
use crate::ids::{ParticipantId, RoomId};

/// A message as handed to the persistence sink and returned as history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Room the message was sent into.
    pub room_id: RoomId,
    /// Sender.
    pub sender_id: ParticipantId,
    /// Derived recipient.
    pub receiver_id: ParticipantId,
    /// Message body.
    pub message: String,
    /// When the hub accepted the message.
    pub timestamp: DateTime<Utc>,
    /// Whether the receiver has read it. Always `false` on insert.
    pub is_read: bool,
}

impl ChatMessage {
    /// Build an unread record for a frame, stamped now.
    pub fn from_frame(frame: &OutboundFrame) -> Self {
        Self::from_frame_at(frame, Utc::now())
    }

    /// Build an unread record for a frame with an explicit timestamp.
    pub fn from_frame_at(frame: &OutboundFrame, timestamp: DateTime<Utc>) -> Self {
        Self {
            room_id: frame.room_id.clone(),
            sender_id: frame.sender_id.clone(),
            receiver_id: frame.receiver_id.clone(),
            message: frame.message.clone(),
            timestamp,
            is_read: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn from_frame_copies_fields_unread() {
        let frame = OutboundFrame::new("alice_bob".into(), "alice".into(), "hi");
        let msg = ChatMessage::from_frame(&frame);
        assert_eq!(msg.room_id, frame.room_id);
        assert_eq!(msg.sender_id, frame.sender_id);
        assert_eq!(msg.receiver_id.as_str(), "bob");
        assert_eq!(msg.message, "hi");
        assert!(!msg.is_read);
    }

    #[test]
    fn serializes_timestamp_as_rfc3339() {
        let frame = OutboundFrame::new("alice_bob".into(), "alice".into(), "hi");
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let msg = ChatMessage::from_frame_at(&frame, at);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["timestamp"], "2026-01-02T03:04:05Z");
        assert_eq!(json["is_read"], false);
    }
}
