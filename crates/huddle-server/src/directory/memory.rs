//! In-process room directory.

use async_trait::async_trait;
use huddle_core::ParticipantId;
use huddle_core::routing::room_participants;
use parking_lot::RwLock;

use super::{DirectoryError, RoomDirectory, RoomRecord};

/// Room records kept in memory, returned in insertion order.
///
/// A participant belongs to a record when it has a profile there or when the
/// room id names it as one of two participants.
#[derive(Debug, Default)]
pub struct MemoryRoomDirectory {
    records: RwLock<Vec<RoomRecord>>,
}

impl MemoryRoomDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, replacing any existing record with the same room id.
    pub fn insert(&self, record: RoomRecord) {
        let mut records = self.records.write();
        if let Some(existing) = records.iter_mut().find(|r| r.room_id == record.room_id) {
            *existing = record;
        } else {
            records.push(record);
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the directory has no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn includes(record: &RoomRecord, participant: &ParticipantId) -> bool {
    record.participants.contains_key(participant)
        || room_participants(&record.room_id)
            .is_some_and(|(a, b)| a == participant.as_str() || b == participant.as_str())
}

#[async_trait]
impl RoomDirectory for MemoryRoomDirectory {
    async fn rooms_for(&self, participant: &ParticipantId) -> Result<Vec<RoomRecord>, DirectoryError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| includes(r, participant))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::ParticipantProfile;

    #[tokio::test]
    async fn finds_rooms_by_id_convention_and_profile() {
        let dir = MemoryRoomDirectory::new();
        dir.insert(RoomRecord::bare("alice_bob".into()));
        dir.insert(RoomRecord::bare("bob_carol".into()));
        dir.insert(
            RoomRecord::bare("lobby".into()).with_participant("alice", ParticipantProfile::default()),
        );

        let ids: Vec<_> = dir
            .rooms_for(&"alice".into())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.room_id.into_inner())
            .collect();
        assert_eq!(ids, ["alice_bob", "lobby"]);

        let ids: Vec<_> = dir
            .rooms_for(&"carol".into())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.room_id.into_inner())
            .collect();
        assert_eq!(ids, ["bob_carol"]);
    }

    #[tokio::test]
    async fn insert_replaces_same_room() {
        let dir = MemoryRoomDirectory::new();
        dir.insert(RoomRecord::bare("alice_bob".into()));
        dir.insert(
            RoomRecord::bare("alice_bob".into()).with_participant(
                "bob",
                ParticipantProfile {
                    username: "Bob".into(),
                    avatar_url: None,
                },
            ),
        );
        assert_eq!(dir.len(), 1);
        let rooms = dir.rooms_for(&"bob".into()).await.unwrap();
        assert_eq!(rooms[0].participants.len(), 1);
    }

    #[tokio::test]
    async fn unknown_participant_has_no_rooms() {
        let dir = MemoryRoomDirectory::new();
        assert!(dir.is_empty());
        dir.insert(RoomRecord::bare("alice_bob".into()));
        assert!(dir.rooms_for(&"zed".into()).await.unwrap().is_empty());
    }
}
