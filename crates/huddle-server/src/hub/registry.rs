//! Process-wide map from room id to running room.

use std::collections::HashMap;
use std::sync::Arc;

use huddle_core::RoomId;
use metrics::gauge;
use parking_lot::Mutex;
use tracing::info;

use super::room::Room;
use crate::metrics::HUB_ROOMS_ACTIVE;

/// Creates rooms on first reference and keeps exactly one per id.
///
/// The lock is held only for lookup-or-create; room operations go through
/// the room's own queue. Rooms are never removed.
#[derive(Debug)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomId, Arc<Room>>>,
    queue_capacity: usize,
}

impl RoomRegistry {
    /// Create an empty registry whose rooms queue up to `queue_capacity`
    /// pending operations each.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            queue_capacity,
        }
    }

    /// Return the room for `id`, starting it if this is the first reference.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn get_or_create(&self, id: &RoomId) -> Arc<Room> {
        let mut rooms = self.rooms.lock();
        if let Some(room) = rooms.get(id) {
            return Arc::clone(room);
        }
        let room = Room::spawn(id.clone(), self.queue_capacity);
        let _ = rooms.insert(id.clone(), Arc::clone(&room));
        #[allow(clippy::cast_precision_loss)]
        gauge!(HUB_ROOMS_ACTIVE).set(rooms.len() as f64);
        drop(rooms);
        info!(room_id = %id, "room created");
        room
    }

    /// Look up an existing room without creating it.
    pub fn get(&self, id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.lock().get(id).cloned()
    }

    /// Number of rooms ever created.
    pub fn room_count(&self) -> usize {
        self.rooms.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_id_same_room() {
        let registry = RoomRegistry::new(8);
        let a = registry.get_or_create(&"lobby".into());
        let b = registry.get_or_create(&"lobby".into());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.room_count(), 1);
    }

    #[tokio::test]
    async fn distinct_ids_distinct_rooms() {
        let registry = RoomRegistry::new(8);
        let a = registry.get_or_create(&"alice_bob".into());
        let b = registry.get_or_create(&"alice_carol".into());
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(a.id().as_str(), "alice_bob");
        assert_eq!(b.id().as_str(), "alice_carol");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_get_or_create_yields_one_instance() {
        let registry = Arc::new(RoomRegistry::new(8));
        let mut handles = Vec::new();
        for i in 0..64 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let shared = registry.get_or_create(&"shared".into());
                let own = registry.get_or_create(&format!("room_{}", i % 8).into());
                (shared, own)
            }));
        }
        let mut shared_rooms = Vec::new();
        for handle in handles {
            let (shared, _own) = handle.await.unwrap();
            shared_rooms.push(shared);
        }
        let first = &shared_rooms[0];
        assert!(shared_rooms.iter().all(|r| Arc::ptr_eq(r, first)));
        assert_eq!(registry.room_count(), 9);
    }

    #[tokio::test]
    async fn get_does_not_create() {
        let registry = RoomRegistry::new(8);
        assert!(registry.get(&"nowhere".into()).is_none());
        assert_eq!(registry.room_count(), 0);
        let created = registry.get_or_create(&"somewhere".into());
        let found = registry.get(&"somewhere".into()).unwrap();
        assert!(Arc::ptr_eq(&created, &found));
    }
}
