//! Recipient derivation from room ids.
//!
//! A direct-message room is named after its two participants joined by an
//! underscore (`"alice_bob"`). The receiver of a message sent into such a
//! room is the component that is not the sender.

use crate::ids::{ParticipantId, RoomId};

/// Separator between participant ids in a two-party room id.
pub const ROOM_ID_SEPARATOR: char = '_';

/// Split a two-party room id into its participants.
///
/// Returns `None` unless the id has exactly two non-empty components.
pub fn room_participants(room_id: &RoomId) -> Option<(&str, &str)> {
    let (a, b) = room_id.split_once(ROOM_ID_SEPARATOR)?;
    if a.is_empty() || b.is_empty() || b.contains(ROOM_ID_SEPARATOR) {
        return None;
    }
    Some((a, b))
}

/// Compute the `receiver_id` of a message sent by `sender` into `room_id`.
///
/// For a two-party room this is the first component that differs from the
/// sender. Rooms that do not encode exactly two participants, and a room
/// whose both components equal the sender, have no receiver (empty string).
pub fn derive_receiver(room_id: &RoomId, sender: &ParticipantId) -> ParticipantId {
    let receiver = room_participants(room_id)
        .and_then(|(a, b)| [a, b].into_iter().find(|p| *p != sender.as_str()))
        .unwrap_or_default();
    ParticipantId::new(receiver)
}

/// Build the canonical two-party room id for a pair of participants.
pub fn direct_room_id(a: &ParticipantId, b: &ParticipantId) -> RoomId {
    RoomId::new(format!("{a}{ROOM_ID_SEPARATOR}{b}"))
}
