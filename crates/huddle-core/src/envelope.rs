//! Inbound wire envelope.
//!
//! One JSON object per WebSocket text frame:
//!
//! ```json
//! {"type": "join" | "leave" | "message", "room_id": "alice_bob", "text": "hi"}
//! ```
//!
//! `text` is only meaningful for `message`; it is ignored on the other kinds.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::RoomId;

/// Errors decoding an inbound envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The frame was not a valid envelope object.
    #[error("invalid envelope JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A binary frame did not carry UTF-8 text.
    #[error("envelope is not valid UTF-8")]
    NotUtf8,
}

/// The intent carried by an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeKind {
    /// Become a member of a room.
    Join,
    /// Stop being a member of a room.
    Leave,
    /// Broadcast text to a room.
    Send,
}

impl fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Send => "message",
        })
    }
}

/// A decoded inbound envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// `{"type": "join", "room_id": ...}`
    Join {
        /// Room to join.
        room_id: RoomId,
    },
    /// `{"type": "leave", "room_id": ...}`
    Leave {
        /// Room to leave.
        room_id: RoomId,
    },
    /// `{"type": "message", "room_id": ..., "text": ...}`
    #[serde(rename = "message")]
    Send {
        /// Target room.
        room_id: RoomId,
        /// Message body. Missing text decodes as empty.
        #[serde(default)]
        text: String,
    },
}

impl Envelope {
    /// Decode an envelope from a text frame.
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Decode an envelope from a binary frame holding UTF-8 JSON.
    pub fn decode_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let text = std::str::from_utf8(bytes).map_err(|_| EnvelopeError::NotUtf8)?;
        Self::decode(text)
    }

    /// The envelope's kind.
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Self::Join { .. } => EnvelopeKind::Join,
            Self::Leave { .. } => EnvelopeKind::Leave,
            Self::Send { .. } => EnvelopeKind::Send,
        }
    }

    /// The room this envelope targets.
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::Join { room_id } | Self::Leave { room_id } | Self::Send { room_id, .. } => {
                room_id
            }
        }
    }

    /// The message body, present only for `message` envelopes.
    pub fn payload(&self) -> Option<&str> {
        match self {
            Self::Send { text, .. } => Some(text),
            Self::Join { .. } | Self::Leave { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn decodes_join() {
        let env = Envelope::decode(r#"{"type":"join","room_id":"alice_bob"}"#).unwrap();
        assert_eq!(
            env,
            Envelope::Join {
                room_id: RoomId::new("alice_bob")
            }
        );
        assert_eq!(env.kind(), EnvelopeKind::Join);
        assert!(env.payload().is_none());
    }

    #[test]
    fn decodes_leave() {
        let env = Envelope::decode(r#"{"type":"leave","room_id":"r1"}"#).unwrap();
        assert_eq!(env.kind(), EnvelopeKind::Leave);
        assert_eq!(env.room_id().as_str(), "r1");
    }

    #[test]
    fn decodes_message_with_text() {
        let env =
            Envelope::decode(r#"{"type":"message","room_id":"alice_bob","text":"hello"}"#)
                .unwrap();
        assert_eq!(env.kind(), EnvelopeKind::Send);
        assert_eq!(env.payload(), Some("hello"));
    }

    #[test]
    fn message_without_text_is_empty() {
        let env = Envelope::decode(r#"{"type":"message","room_id":"r"}"#).unwrap();
        assert_eq!(env.payload(), Some(""));
    }

    #[test]
    fn text_on_join_is_ignored() {
        let env = Envelope::decode(r#"{"type":"join","room_id":"r","text":"x"}"#).unwrap();
        assert_eq!(env.kind(), EnvelopeKind::Join);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = Envelope::decode(r#"{"type":"typing","room_id":"r"}"#).unwrap_err();
        assert_matches!(err, EnvelopeError::Json(_));
    }

    #[test]
    fn missing_room_id_is_rejected() {
        assert!(Envelope::decode(r#"{"type":"join"}"#).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(Envelope::decode("not json").is_err());
        assert!(Envelope::decode("").is_err());
    }

    #[test]
    fn decode_bytes_requires_utf8() {
        let err = Envelope::decode_bytes(&[0xff, 0xfe]).unwrap_err();
        assert_matches!(err, EnvelopeError::NotUtf8);
        let env = Envelope::decode_bytes(br#"{"type":"leave","room_id":"r"}"#).unwrap();
        assert_eq!(env.kind(), EnvelopeKind::Leave);
    }

    #[test]
    fn kind_display_uses_wire_names() {
        assert_eq!(EnvelopeKind::Join.to_string(), "join");
        assert_eq!(EnvelopeKind::Leave.to_string(), "leave");
        assert_eq!(EnvelopeKind::Send.to_string(), "message");
    }
}
