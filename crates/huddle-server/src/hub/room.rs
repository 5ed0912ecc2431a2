//! A room: one task owning the membership map, fed by a bounded queue.
//!
//! Every operation on a room goes through its queue, so joins, leaves and
//! broadcasts are applied one at a time in submission order. Fan-out never
//! waits on a member: a full mailbox gets the member evicted and the frame
//! is not delivered to it.

use std::collections::HashMap;
use std::sync::Arc;

use huddle_core::{ParticipantId, RoomId};
use metrics::counter;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::HubError;
use super::connection::{ClientConnection, Delivery};
use crate::metrics::{HUB_BROADCASTS_TOTAL, HUB_EVICTIONS_TOTAL};

/// An operation queued on a room.
enum RoomCommand {
    Join {
        connection: Arc<ClientConnection>,
    },
    Leave {
        connection: Arc<ClientConnection>,
        done: oneshot::Sender<bool>,
    },
    Broadcast {
        frame: Arc<String>,
    },
    Members {
        reply: oneshot::Sender<Vec<ParticipantId>>,
    },
}

/// Handle to a running room.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    tx: mpsc::Sender<RoomCommand>,
}

impl Room {
    /// Start the room's loop on the current runtime and return its handle.
    pub(crate) fn spawn(id: RoomId, queue_capacity: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let state = RoomState::new(id.clone());
        let _ = tokio::spawn(state.run(rx));
        Arc::new(Self { id, tx })
    }

    /// Room id.
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Queue a join. Waits only while the room's queue is full.
    pub async fn join(&self, connection: Arc<ClientConnection>) -> Result<(), HubError> {
        self.submit(RoomCommand::Join { connection }).await
    }

    /// Remove `connection` and wait until the room has applied it.
    ///
    /// Returns whether it was a member. Only the exact connection is removed:
    /// a newer socket of the same participant that replaced it stays.
    pub async fn leave(&self, connection: &Arc<ClientConnection>) -> Result<bool, HubError> {
        let (done, rx) = oneshot::channel();
        self.submit(RoomCommand::Leave {
            connection: Arc::clone(connection),
            done,
        })
        .await?;
        rx.await.map_err(|_| self.closed())
    }

    /// Queue a frame for every current member.
    pub async fn broadcast(&self, frame: Arc<String>) -> Result<(), HubError> {
        self.submit(RoomCommand::Broadcast { frame }).await
    }

    /// Current member ids, sorted, as of every operation queued before this call.
    pub async fn members(&self) -> Result<Vec<ParticipantId>, HubError> {
        let (reply, rx) = oneshot::channel();
        self.submit(RoomCommand::Members { reply }).await?;
        rx.await.map_err(|_| self.closed())
    }

    async fn submit(&self, command: RoomCommand) -> Result<(), HubError> {
        self.tx.send(command).await.map_err(|_| self.closed())
    }

    fn closed(&self) -> HubError {
        HubError::RoomClosed(self.id.clone())
    }
}

/// State owned by the room task.
struct RoomState {
    id: RoomId,
    members: HashMap<ParticipantId, Arc<ClientConnection>>,
}

impl RoomState {
    fn new(id: RoomId) -> Self {
        Self {
            id,
            members: HashMap::new(),
        }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        debug!(room_id = %self.id, "room loop started");
        while let Some(command) = rx.recv().await {
            self.apply(command);
        }
        debug!(room_id = %self.id, "room loop stopped");
    }

    fn apply(&mut self, command: RoomCommand) {
        match command {
            RoomCommand::Join { connection } => self.join(connection),
            RoomCommand::Leave { connection, done } => {
                let _ = done.send(self.leave(&connection));
            }
            RoomCommand::Broadcast { frame } => self.broadcast(&frame),
            RoomCommand::Members { reply } => {
                let mut ids: Vec<_> = self.members.keys().cloned().collect();
                ids.sort();
                let _ = reply.send(ids);
            }
        }
    }

    fn join(&mut self, connection: Arc<ClientConnection>) {
        let participant = connection.id().clone();
        info!(room_id = %self.id, %participant, connection = connection.tag(), "member joined");
        let _ = self.members.insert(participant, connection);
    }

    fn leave(&mut self, connection: &Arc<ClientConnection>) -> bool {
        let is_current = self
            .members
            .get(connection.id())
            .is_some_and(|member| Arc::ptr_eq(member, connection));
        if is_current {
            let _ = self.members.remove(connection.id());
            info!(room_id = %self.id, participant = %connection.id(), "member left");
        }
        is_current
    }

    fn broadcast(&mut self, frame: &Arc<String>) {
        counter!(HUB_BROADCASTS_TOTAL).increment(1);
        let room_id = &self.id;
        self.members
            .retain(|participant, member| match member.offer(Arc::clone(frame)) {
                Delivery::Queued => true,
                Delivery::Full => {
                    let _ = member.close();
                    counter!(HUB_EVICTIONS_TOTAL).increment(1);
                    warn!(%room_id, %participant, "mailbox full, evicting member");
                    false
                }
                Delivery::Closed => {
                    debug!(%room_id, %participant, "dropping member with closed mailbox");
                    false
                }
            });
    }
}
