//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. Every section is `#[serde(default)]`
//! so a partial JSON file only needs the keys it overrides.

use serde::{Deserialize, Serialize};

/// Root settings for the Huddle server.
///
/// ```json
/// {
///   "server": { "port": 4000 },
///   "auth": { "jwtSecret": "..." },
///   "directory": { "backend": "redis" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HuddleSettings {
    /// HTTP listener.
    pub server: ServerSettings,
    /// Room hub sizing.
    pub hub: HubSettings,
    /// Token verification.
    pub auth: AuthSettings,
    /// Room directory backend.
    pub directory: DirectorySettings,
    /// Message store backend.
    pub store: StoreSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` picks an ephemeral port).
    pub port: u16,
    /// Largest accepted WebSocket message, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            max_message_size: 64 * 1024,
        }
    }
}

/// Room hub sizing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Outbound frames buffered per connection before it is evicted.
    pub mailbox_capacity: usize,
    /// Pending operations buffered per room before submitters wait.
    pub room_queue_capacity: usize,
    /// Messages returned per room by the history endpoint.
    pub history_limit: usize,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: 256,
            room_queue_capacity: 64,
            history_limit: 10,
        }
    }
}

/// Token verification settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HMAC secret the session tokens are signed with.
    pub jwt_secret: String,
    /// Cookie carrying the session token.
    pub cookie_name: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            cookie_name: "token".to_string(),
        }
    }
}

/// Where participants' room memberships are discovered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryBackend {
    /// Process-local map (tests, single-node demos).
    #[default]
    Memory,
    /// Redis key scan.
    Redis,
}

/// Room directory settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DirectorySettings {
    /// Backend to use.
    pub backend: DirectoryBackend,
    /// Redis connection URL.
    pub redis_url: String,
    /// Key prefix of room records (`{prefix}:{a}:{b}`).
    pub key_prefix: String,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            backend: DirectoryBackend::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: "chat:room".to_string(),
        }
    }
}

/// Where broadcast messages are persisted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local list, lost on exit.
    Memory,
    /// `SQLite` file.
    #[default]
    Sqlite,
}

/// Message store settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Backend to use.
    pub backend: StoreBackend,
    /// Database file for the `SQLite` backend.
    pub sqlite_path: String,
    /// Connection pool size for the `SQLite` backend.
    pub pool_size: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            sqlite_path: "huddle.db".to_string(),
            pool_size: 8,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
