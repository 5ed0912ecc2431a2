//! WebSocket session lifecycle: one connected participant from upgrade
//! through disconnect.
//!
//! The read loop is the only writer of the session's membership list. The
//! write loop is the only reader of the mailbox. Teardown always runs the
//! same way: leave every joined room, close the mailbox, let the write loop
//! send its close frame.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use huddle_core::{ChatMessage, Envelope, EnvelopeError, OutboundFrame, RoomId};
use huddle_store::MessageStore;
use metrics::{counter, gauge, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, instrument, warn};

use crate::hub::{ClientConnection, Mailbox, RoomRegistry};
use crate::metrics::{
    STORE_FAILURES_TOTAL, WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE,
    WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL, WS_MALFORMED_ENVELOPES_TOTAL,
};

/// How long teardown waits for the write loop to flush its close frame.
const WRITER_GRACE: Duration = Duration::from_secs(5);

/// Shared handles a session needs.
#[derive(Clone)]
pub struct SessionContext {
    /// Room registry.
    pub registry: Arc<RoomRegistry>,
    /// Persistence sink for broadcast messages.
    pub store: Arc<dyn MessageStore>,
    /// Fires when the server is shutting down.
    pub shutdown: CancellationToken,
}

/// Run a session over an upgraded socket.
#[instrument(skip_all, fields(participant = %connection.id(), connection = connection.tag()))]
pub async fn run_ws_session(
    ws: WebSocket,
    connection: Arc<ClientConnection>,
    mailbox: Mailbox,
    initial_rooms: Vec<RoomId>,
    ctx: SessionContext,
) {
    let (sink, stream) = ws.split();
    drive(stream, sink, connection, mailbox, initial_rooms, &ctx).await;
}

/// Run a session over any message stream and sink.
///
/// Joins `initial_rooms` in order, then reads until the peer closes, the
/// socket fails, the write loop stops, or shutdown fires.
pub async fn drive<St, Si, E>(
    mut stream: St,
    sink: Si,
    connection: Arc<ClientConnection>,
    mailbox: Mailbox,
    initial_rooms: Vec<RoomId>,
    ctx: &SessionContext,
) where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    Si: Sink<Message> + Unpin + Send + 'static,
    Si::Error: Display + Send,
{
    info!("client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let writer_done = CancellationToken::new();
    let mut writer = tokio::spawn(write_loop(sink, mailbox, writer_done.clone()).in_current_span());

    let mut reader = ReadLoop {
        connection: Arc::clone(&connection),
        memberships: Vec::new(),
        ctx,
    };
    for room_id in initial_rooms {
        reader.join(room_id).await;
    }

    loop {
        let next = tokio::select! {
            biased;
            () = ctx.shutdown.cancelled() => {
                debug!("server shutting down, ending session");
                break;
            }
            () = writer_done.cancelled() => {
                debug!("write loop ended, ending session");
                break;
            }
            next = stream.next() => next,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                info!(error = %e, "socket read failed");
                break;
            }
            None => break,
        };

        match message {
            Message::Text(text) => reader.handle(Envelope::decode(text.as_str())).await,
            Message::Binary(bytes) => reader.handle(Envelope::decode_bytes(&bytes)).await,
            Message::Close(_) => {
                info!("client sent close frame");
                break;
            }
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    reader.teardown().await;
    if tokio::time::timeout(WRITER_GRACE, &mut writer).await.is_err() {
        debug!("write loop did not finish in time, aborting");
        writer.abort();
    }

    info!(dropped = connection.drop_count(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection.age().as_secs_f64());
}

/// Deliver mailbox frames in order; send a close frame once the mailbox closes.
async fn write_loop<Si>(mut sink: Si, mut mailbox: Mailbox, done: CancellationToken)
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    let _done = done.drop_guard();
    while let Some(frame) = mailbox.recv().await {
        if let Err(e) = sink.send(Message::Text(frame.as_str().into())).await {
            debug!(error = %e, "socket write failed");
            return;
        }
    }
    if let Err(e) = sink.send(Message::Close(None)).await {
        debug!(error = %e, "failed to send close frame");
    }
}

struct ReadLoop<'a> {
    connection: Arc<ClientConnection>,
    memberships: Vec<RoomId>,
    ctx: &'a SessionContext,
}

impl ReadLoop<'_> {
    async fn handle(&mut self, decoded: Result<Envelope, EnvelopeError>) {
        let envelope = match decoded {
            Ok(envelope) => envelope,
            Err(e) => {
                counter!(WS_MALFORMED_ENVELOPES_TOTAL).increment(1);
                warn!(error = %e, "malformed envelope, skipping");
                return;
            }
        };
        debug!(kind = %envelope.kind(), room_id = %envelope.room_id(), "envelope received");
        match envelope {
            Envelope::Join { room_id } => self.join(room_id).await,
            Envelope::Leave { room_id } => self.leave(&room_id).await,
            Envelope::Send { room_id, text } => self.send(room_id, text).await,
        }
    }

    async fn join(&mut self, room_id: RoomId) {
        let room = self.ctx.registry.get_or_create(&room_id);
        if let Err(e) = room.join(Arc::clone(&self.connection)).await {
            warn!(%room_id, error = %e, "join failed");
            return;
        }
        // Re-joining refreshes the room's entry but is listed once.
        if !self.memberships.contains(&room_id) {
            self.memberships.push(room_id);
        }
    }

    async fn leave(&mut self, room_id: &RoomId) {
        let Some(pos) = self.memberships.iter().position(|r| r == room_id) else {
            debug!(%room_id, "leave for a room not joined, ignoring");
            return;
        };
        let room_id = self.memberships.remove(pos);
        if let Some(room) = self.ctx.registry.get(&room_id) {
            if let Err(e) = room.leave(&self.connection).await {
                warn!(%room_id, error = %e, "leave failed");
            }
        }
    }

    async fn send(&mut self, room_id: RoomId, text: String) {
        if !self.memberships.contains(&room_id) {
            debug!(%room_id, "message for a room not joined, dropping");
            return;
        }
        let Some(room) = self.ctx.registry.get(&room_id) else {
            return;
        };
        let frame = OutboundFrame::new(room_id, self.connection.id().clone(), text);
        let line = match frame.to_line() {
            Ok(line) => Arc::new(line),
            Err(e) => {
                warn!(error = %e, "failed to encode frame");
                return;
            }
        };
        if let Err(e) = room.broadcast(line).await {
            warn!(room_id = %frame.room_id, error = %e, "broadcast failed");
            return;
        }
        self.persist(&frame);
    }

    /// Hand the message to the store on a detached task.
    fn persist(&self, frame: &OutboundFrame) {
        let store = Arc::clone(&self.ctx.store);
        let message = ChatMessage::from_frame(frame);
        let _ = tokio::spawn(
            async move {
                if let Err(e) = store.store(message).await {
                    counter!(STORE_FAILURES_TOTAL).increment(1);
                    warn!(error = %e, "failed to persist message");
                }
            }
            .in_current_span(),
        );
    }

    async fn teardown(&mut self) {
        for room_id in std::mem::take(&mut self.memberships) {
            if let Some(room) = self.ctx.registry.get(&room_id) {
                if let Err(e) = room.leave(&self.connection).await {
                    debug!(%room_id, error = %e, "leave during teardown failed");
                }
            }
        }
        if self.connection.close() {
            debug!("mailbox closed");
        }
    }
}
