//! # huddle-server
//!
//! The room broadcast hub and the HTTP + `WebSocket` surface around it.
//!
//! - [`hub`]: per-room event loops, the room registry, bounded mailboxes
//! - [`websocket`]: a participant's read and write loops
//! - [`coordinator`]: authentication, room discovery, session startup
//! - [`auth`]: JWT session tokens
//! - [`directory`]: where a participant's rooms come from (memory, Redis)
//! - [`server`]: Axum router for `/ws`, `/rooms`, `/health`, `/metrics`
//! - Graceful shutdown via `CancellationToken`
//!
//! ## Crate Position
//!
//! Depends on huddle-core, huddle-settings and huddle-store. Depended on by
//! huddle-agent.

#![deny(unsafe_code)]

pub mod auth;
pub mod coordinator;
pub mod directory;
pub mod health;
pub mod hub;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use coordinator::SessionCoordinator;
pub use server::HuddleServer;
pub use shutdown::ShutdownCoordinator;
