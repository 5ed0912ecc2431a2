//! # huddle-store
//!
//! Persistence sink for chat messages accepted by the hub.
//!
//! - [`MessageStore`]: async trait the hub writes through
//! - [`SqliteMessageStore`]: `SQLite` via an `r2d2` pool, work on the blocking pool
//! - [`MemoryMessageStore`]: process-local store for tests and demos

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod memory;
pub mod migrations;
pub mod sqlite;
pub mod store;

pub use connection::ConnectionConfig;
pub use errors::{Result, StoreError};
pub use memory::MemoryMessageStore;
pub use sqlite::SqliteMessageStore;
pub use store::MessageStore;
