//! Session coordinator: authenticates a request, discovers the caller's
//! rooms, and hands an upgraded socket to the hub.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::ws::WebSocket;
use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;
use huddle_core::{ChatMessage, ParticipantId, RoomId};
use huddle_settings::HuddleSettings;
use huddle_store::MessageStore;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::auth::{AuthError, TokenVerifier};
use crate::directory::{DirectoryError, ParticipantProfile, RoomDirectory};
use crate::hub::{ClientConnection, Mailbox, RoomRegistry};
use crate::websocket::{SessionContext, run_ws_session};

/// What a new session starts with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionBootstrap {
    /// Authenticated participant.
    pub participant: ParticipantId,
    /// Rooms to join on connect, in directory order, without repeats.
    pub rooms: Vec<RoomId>,
}

/// One participant as shown in a room listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    /// Participant id; omitted when unknown.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// Avatar URL.
    pub avatar_url: Option<String>,
}

impl UserSummary {
    fn from_profile(id: &ParticipantId, profile: Option<&ParticipantProfile>) -> Self {
        let profile = profile.cloned().unwrap_or_default();
        Self {
            user_id: id.to_string(),
            username: profile.username,
            avatar_url: profile.avatar_url,
        }
    }
}

/// One entry of the `/rooms` listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoomOverview {
    /// Room id.
    pub room_id: RoomId,
    /// The caller.
    pub user: UserSummary,
    /// The other participant, if the room has one.
    pub receiver: UserSummary,
    /// Most recent messages, newest first.
    pub history: Vec<ChatMessage>,
}

/// Glue between the HTTP surface and the hub.
pub struct SessionCoordinator {
    registry: Arc<RoomRegistry>,
    directory: Arc<dyn RoomDirectory>,
    store: Arc<dyn MessageStore>,
    verifier: TokenVerifier,
    cookie_name: String,
    mailbox_capacity: usize,
    history_limit: usize,
    active: AtomicUsize,
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("rooms", &self.registry.room_count())
            .field("active", &self.active_connections())
            .finish_non_exhaustive()
    }
}

impl SessionCoordinator {
    /// Build a coordinator with a fresh room registry.
    pub fn new(
        settings: &HuddleSettings,
        directory: Arc<dyn RoomDirectory>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        Self {
            registry: Arc::new(RoomRegistry::new(settings.hub.room_queue_capacity)),
            directory,
            store,
            verifier: TokenVerifier::new(&settings.auth.jwt_secret),
            cookie_name: settings.auth.cookie_name.clone(),
            mailbox_capacity: settings.hub.mailbox_capacity,
            history_limit: settings.hub.history_limit,
            active: AtomicUsize::new(0),
        }
    }

    /// The room registry shared by every session.
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// The persistence sink.
    pub fn store(&self) -> &Arc<dyn MessageStore> {
        &self.store
    }

    /// Sockets currently attached.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Identify the participant behind a request.
    pub fn authenticate(&self, jar: &CookieJar, headers: &HeaderMap) -> Result<ParticipantId, AuthError> {
        self.verifier.authenticate(jar, headers, &self.cookie_name)
    }

    /// Resolve the rooms `participant` joins on connect.
    pub async fn bootstrap(&self, participant: ParticipantId) -> Result<SessionBootstrap, DirectoryError> {
        let records = self.directory.rooms_for(&participant).await?;
        let mut rooms: Vec<RoomId> = Vec::with_capacity(records.len());
        for record in records {
            if !rooms.contains(&record.room_id) {
                rooms.push(record.room_id);
            }
        }
        Ok(SessionBootstrap { participant, rooms })
    }

    /// Create the connection and mailbox for a new socket.
    pub fn open(&self, participant: ParticipantId) -> (Arc<ClientConnection>, Mailbox) {
        ClientConnection::channel(participant, self.mailbox_capacity)
    }

    /// Run an upgraded socket until it disconnects or `shutdown` fires.
    pub async fn serve(&self, socket: WebSocket, bootstrap: SessionBootstrap, shutdown: CancellationToken) {
        let (connection, mailbox) = self.open(bootstrap.participant);
        let ctx = SessionContext {
            registry: Arc::clone(&self.registry),
            store: Arc::clone(&self.store),
            shutdown,
        };
        let _ = self.active.fetch_add(1, Ordering::Relaxed);
        run_ws_session(socket, connection, mailbox, bootstrap.rooms, ctx).await;
        let _ = self.active.fetch_sub(1, Ordering::Relaxed);
    }

    /// The caller's rooms with both profiles and recent history.
    ///
    /// A room whose history cannot be loaded is left out.
    pub async fn room_overview(&self, participant: &ParticipantId) -> Result<Vec<RoomOverview>, DirectoryError> {
        let records = self.directory.rooms_for(participant).await?;
        let mut overview = Vec::with_capacity(records.len());
        for record in records {
            let history = match self.store.recent(&record.room_id, self.history_limit).await {
                Ok(history) => history,
                Err(e) => {
                    warn!(room_id = %record.room_id, error = %e, "failed to load room history, skipping");
                    continue;
                }
            };
            let user = UserSummary::from_profile(participant, record.participants.get(participant));
            let receiver = record
                .counterpart(participant)
                .map(|(id, profile)| UserSummary::from_profile(id, Some(profile)))
                .unwrap_or_default();
            overview.push(RoomOverview {
                room_id: record.room_id,
                user,
                receiver,
                history,
            });
        }
        Ok(overview)
    }
}
