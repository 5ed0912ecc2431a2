//! WebSocket sessions.

pub mod session;

pub use session::{SessionContext, drive, run_ws_session};
