//! `HuddleServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum_extra::extract::CookieJar;
use huddle_settings::{HuddleSettings, ServerSettings};
use huddle_store::MessageStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::coordinator::SessionCoordinator;
use crate::directory::RoomDirectory;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Authentication, room discovery and the hub.
    pub coordinator: Arc<SessionCoordinator>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Renders `/metrics`.
    pub metrics: PrometheusHandle,
    /// When the server started.
    pub start_time: Instant,
    /// Largest accepted WebSocket message, in bytes.
    pub max_message_size: usize,
}

/// The chat server.
pub struct HuddleServer {
    settings: ServerSettings,
    coordinator: Arc<SessionCoordinator>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: PrometheusHandle,
    start_time: Instant,
}

impl std::fmt::Debug for HuddleServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HuddleServer")
            .field("settings", &self.settings)
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

impl HuddleServer {
    /// Create a server over the given collaborators.
    pub fn new(
        settings: &HuddleSettings,
        directory: Arc<dyn RoomDirectory>,
        store: Arc<dyn MessageStore>,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            settings: settings.server.clone(),
            coordinator: Arc::new(SessionCoordinator::new(settings, directory, store)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            coordinator: Arc::clone(&self.coordinator),
            shutdown: Arc::clone(&self.shutdown),
            metrics: self.metrics.clone(),
            start_time: self.start_time,
            max_message_size: self.settings.max_message_size,
        };

        Router::new()
            .route("/ws", get(ws_handler))
            .route("/rooms", get(rooms_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(CorsLayer::very_permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown fires.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.settings.host, self.settings.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "http server failed");
            }
        });
        info!(%local_addr, "huddle server listening");
        Ok((local_addr, handle))
    }

    /// The session coordinator.
    pub fn coordinator(&self) -> &Arc<SessionCoordinator> {
        &self.coordinator
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

/// GET /ws
async fn ws_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let coordinator = Arc::clone(&state.coordinator);
    let participant = match coordinator.authenticate(&jar, &headers) {
        Ok(participant) => participant,
        Err(e) => {
            info!(error = %e, "rejected websocket handshake");
            return (StatusCode::UNAUTHORIZED, e.public_message()).into_response();
        }
    };
    let bootstrap = match coordinator.bootstrap(participant).await {
        Ok(bootstrap) => bootstrap,
        Err(e) => {
            warn!(error = %e, "room lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "room lookup failed").into_response();
        }
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let shutdown = state.shutdown.token();
    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| async move {
            coordinator.serve(socket, bootstrap, shutdown).await;
        })
        .into_response()
}

/// GET /rooms
async fn rooms_handler(State(state): State<AppState>, jar: CookieJar, headers: HeaderMap) -> Response {
    let participant = match state.coordinator.authenticate(&jar, &headers) {
        Ok(participant) => participant,
        Err(e) => return (StatusCode::UNAUTHORIZED, e.public_message()).into_response(),
    };
    match state.coordinator.room_overview(&participant).await {
        Ok(rooms) => Json(rooms).into_response(),
        Err(e) => {
            warn!(%participant, error = %e, "room listing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "room lookup failed").into_response()
        }
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.coordinator.registry().room_count(),
        state.coordinator.active_connections(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
