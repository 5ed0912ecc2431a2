//! One participant's socket as seen by the rooms: an id plus the producer
//! side of a bounded outbound mailbox.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use huddle_core::ParticipantId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Outcome of offering a frame to a mailbox.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The frame was enqueued.
    Queued,
    /// The mailbox is at capacity; the frame was not enqueued.
    Full,
    /// The mailbox has been closed; the frame was not enqueued.
    Closed,
}

/// A connected participant.
///
/// Rooms hold `Arc<ClientConnection>` and only ever call [`offer`] and
/// [`close`]. The matching [`Mailbox`] is owned by the connection's write
/// loop.
///
/// [`offer`]: ClientConnection::offer
/// [`close`]: ClientConnection::close
pub struct ClientConnection {
    id: ParticipantId,
    tag: String,
    tx: mpsc::Sender<Arc<String>>,
    closed: CancellationToken,
    close_once: AtomicBool,
    connected_at: Instant,
    dropped_frames: AtomicU64,
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ClientConnection {
    /// Create a connection and its mailbox holding up to `capacity` frames.
    pub fn channel(id: ParticipantId, capacity: usize) -> (Arc<Self>, Mailbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let closed = CancellationToken::new();
        let connection = Arc::new(Self {
            id,
            tag: format!("conn_{}", Uuid::now_v7()),
            tx,
            closed: closed.clone(),
            close_once: AtomicBool::new(false),
            connected_at: Instant::now(),
            dropped_frames: AtomicU64::new(0),
        });
        (connection, Mailbox { rx, closed })
    }

    /// Participant identity.
    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    /// Unique tag for this socket, distinguishing reconnects of one participant.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Enqueue `frame` without waiting.
    pub fn offer(&self, frame: Arc<String>) -> Delivery {
        if self.is_closed() {
            return Delivery::Closed;
        }
        match self.tx.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
                Delivery::Full
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Close the mailbox. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        if self.close_once.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.closed.cancel();
        true
    }

    /// Whether the mailbox has been closed.
    pub fn is_closed(&self) -> bool {
        self.close_once.load(Ordering::Acquire)
    }

    /// Frames refused because the mailbox was full.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Consumer side of a connection's mailbox.
#[derive(Debug)]
pub struct Mailbox {
    rx: mpsc::Receiver<Arc<String>>,
    closed: CancellationToken,
}

impl Mailbox {
    /// Next frame in FIFO order, or `None` once the mailbox is closed and
    /// every frame queued before the close has been returned.
    pub async fn recv(&mut self) -> Option<Arc<String>> {
        tokio::select! {
            biased;
            frame = self.rx.recv() => frame,
            () = self.closed.cancelled() => self.rx.try_recv().ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(s: &str) -> Arc<String> {
        Arc::new(s.to_string())
    }

    #[tokio::test]
    async fn offer_then_recv_in_order() {
        let (conn, mut mailbox) = ClientConnection::channel("alice".into(), 4);
        assert_eq!(conn.offer(frame("one")), Delivery::Queued);
        assert_eq!(conn.offer(frame("two")), Delivery::Queued);
        assert_eq!(&*mailbox.recv().await.unwrap(), "one");
        assert_eq!(&*mailbox.recv().await.unwrap(), "two");
    }

    #[tokio::test]
    async fn full_mailbox_refuses_and_counts() {
        let (conn, _mailbox) = ClientConnection::channel("alice".into(), 1);
        assert_eq!(conn.offer(frame("one")), Delivery::Queued);
        assert_eq!(conn.offer(frame("two")), Delivery::Full);
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn close_is_exactly_once() {
        let (conn, _mailbox) = ClientConnection::channel("alice".into(), 1);
        assert!(!conn.is_closed());
        assert!(conn.close());
        assert!(!conn.close());
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn closed_mailbox_refuses_offers() {
        let (conn, _mailbox) = ClientConnection::channel("alice".into(), 4);
        let _ = conn.close();
        assert_eq!(conn.offer(frame("late")), Delivery::Closed);
    }

    #[tokio::test]
    async fn recv_drains_then_ends_after_close() {
        let (conn, mut mailbox) = ClientConnection::channel("alice".into(), 4);
        let _ = conn.offer(frame("queued"));
        let _ = conn.close();
        assert_eq!(&*mailbox.recv().await.unwrap(), "queued");
        assert!(mailbox.recv().await.is_none());
    }

    #[tokio::test]
    async fn recv_wakes_on_close() {
        let (conn, mut mailbox) = ClientConnection::channel("alice".into(), 4);
        let waiter = tokio::spawn(async move { mailbox.recv().await });
        tokio::task::yield_now().await;
        let _ = conn.close();
        assert!(waiter.await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dropped_mailbox_reports_closed() {
        let (conn, mailbox) = ClientConnection::channel("alice".into(), 4);
        drop(mailbox);
        assert_eq!(conn.offer(frame("nobody")), Delivery::Closed);
    }

    #[test]
    fn tags_are_unique_per_socket() {
        let (a, _ma) = ClientConnection::channel("alice".into(), 1);
        let (b, _mb) = ClientConnection::channel("alice".into(), 1);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.tag(), b.tag());
        assert!(a.tag().starts_with("conn_"));
    }

    #[test]
    fn age_counts_from_channel_creation() {
        let (conn, _mailbox) = ClientConnection::channel("alice".into(), 1);
        std::thread::sleep(Duration::from_millis(20));
        assert!(conn.age() >= Duration::from_millis(20));
    }
}
