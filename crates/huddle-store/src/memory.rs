//! In-process message store.

use async_trait::async_trait;
use huddle_core::{ChatMessage, RoomId};
use parking_lot::Mutex;

use crate::errors::Result;
use crate::store::MessageStore;

/// Append-only list of messages kept in memory. Contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    messages: Mutex<Vec<ChatMessage>>,
}

impl MemoryMessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages.
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Copy of everything stored, in insertion order.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn store(&self, message: ChatMessage) -> Result<()> {
        self.messages.lock().push(message);
        Ok(())
    }

    async fn recent(&self, room_id: &RoomId, limit: usize) -> Result<Vec<ChatMessage>> {
        let guard = self.messages.lock();
        let mut matching: Vec<(usize, &ChatMessage)> = guard
            .iter()
            .enumerate()
            .filter(|(_, m)| &m.room_id == room_id)
            .collect();
        // Newest first; insertion order breaks timestamp ties.
        matching.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then(ib.cmp(ia)));
        Ok(matching
            .into_iter()
            .take(limit)
            .map(|(_, m)| m.clone())
            .collect())
    }
}
