//! The persistence sink trait.

use async_trait::async_trait;
use huddle_core::{ChatMessage, RoomId};

use crate::errors::Result;

/// Where broadcast messages are recorded and history is read back.
///
/// Implementations must be cheap to share: the hub holds one `Arc<dyn
/// MessageStore>` and calls it from detached tasks.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist one message.
    async fn store(&self, message: ChatMessage) -> Result<()>;

    /// The `limit` most recent messages in `room_id`, newest first.
    async fn recent(&self, room_id: &RoomId, limit: usize) -> Result<Vec<ChatMessage>>;
}
