//! # huddle-agent
//!
//! Huddle server binary: loads settings, wires the room directory and message
//! store backends, and serves until ctrl-c.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use huddle_server::HuddleServer;
use huddle_server::directory::{MemoryRoomDirectory, RedisRoomDirectory, RoomDirectory};
use huddle_settings::{DirectoryBackend, DirectorySettings, HuddleSettings, StoreBackend, StoreSettings};
use huddle_store::{ConnectionConfig, MemoryMessageStore, MessageStore, SqliteMessageStore};
use tracing::{info, warn};

/// How long shutdown waits for the listener to drain.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Huddle chat server.
#[derive(Parser, Debug)]
#[command(name = "huddle-agent", about = "Huddle chat server")]
struct Cli {
    /// Settings file (defaults to `~/.huddle/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,
}

impl Cli {
    fn apply(&self, settings: &mut HuddleSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

fn open_store(settings: &StoreSettings) -> Result<Arc<dyn MessageStore>> {
    match settings.backend {
        StoreBackend::Memory => {
            info!("using in-memory message store");
            Ok(Arc::new(MemoryMessageStore::new()))
        }
        StoreBackend::Sqlite => {
            let path = Path::new(&settings.sqlite_path);
            ensure_parent_dir(path)?;
            let config = ConnectionConfig {
                pool_size: settings.pool_size,
                ..ConnectionConfig::default()
            };
            let store = SqliteMessageStore::open(&settings.sqlite_path, &config)
                .with_context(|| format!("Failed to open database: {}", path.display()))?;
            info!(path = %path.display(), "using sqlite message store");
            Ok(Arc::new(store))
        }
    }
}

async fn open_directory(settings: &DirectorySettings) -> Result<Arc<dyn RoomDirectory>> {
    match settings.backend {
        DirectoryBackend::Memory => {
            info!("using in-memory room directory");
            Ok(Arc::new(MemoryRoomDirectory::new()))
        }
        DirectoryBackend::Redis => {
            let directory = RedisRoomDirectory::connect(&settings.redis_url, settings.key_prefix.clone())
                .await
                .with_context(|| format!("Failed to connect to redis at {}", settings.redis_url))?;
            info!(prefix = %settings.key_prefix, "using redis room directory");
            Ok(Arc::new(directory))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = args.config.clone().unwrap_or_else(huddle_settings::settings_path);
    let mut settings = huddle_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    args.apply(&mut settings);

    huddle_core::logging::init_subscriber(&settings.logging.level, settings.logging.json);
    if settings.auth.jwt_secret.is_empty() {
        warn!("jwt secret is empty, every handshake will be rejected");
    }

    let metrics = huddle_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;
    let store = open_store(&settings.store)?;
    let directory = open_directory(&settings.directory).await?;

    let server = HuddleServer::new(&settings, directory, store, metrics);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    info!("Huddle listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    info!("Shutting down...");
    if server
        .shutdown()
        .graceful_shutdown(vec![handle], SHUTDOWN_GRACE)
        .await
    {
        info!("Shutdown complete");
    } else {
        warn!("Shutdown forced after {SHUTDOWN_GRACE:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::{ChatMessage, OutboundFrame, RoomId};

    #[test]
    fn cli_defaults_leave_settings_alone() {
        let cli = Cli::parse_from(["huddle-agent"]);
        assert!(cli.config.is_none());
        let mut settings = HuddleSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 3001);
    }

    #[test]
    fn cli_overrides_bind_address() {
        let cli = Cli::parse_from(["huddle-agent", "--host", "127.0.0.1", "--port", "0"]);
        let mut settings = HuddleSettings::default();
        cli.apply(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 0);
    }

    #[test]
    fn cli_config_path() {
        let cli = Cli::parse_from(["huddle-agent", "--config", "/tmp/huddle.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/huddle.json")));
    }

    #[test]
    fn ensure_parent_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("huddle.db");
        ensure_parent_dir(&path).unwrap();
        assert!(path.parent().unwrap().exists());
        ensure_parent_dir(Path::new("bare.db")).unwrap();
    }

    #[tokio::test]
    async fn sqlite_store_is_created_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("data").join("huddle.db");
        let settings = StoreSettings {
            backend: StoreBackend::Sqlite,
            sqlite_path: db_path.to_string_lossy().into_owned(),
            pool_size: 2,
        };

        let store = open_store(&settings).unwrap();
        assert!(db_path.exists());

        let frame = OutboundFrame::new("alice_bob".into(), "alice".into(), "persisted");
        store.store(ChatMessage::from_frame(&frame)).await.unwrap();
        let recent = store.recent(&RoomId::from("alice_bob"), 5).await.unwrap();
        assert_eq!(recent[0].message, "persisted");
    }

    #[tokio::test]
    async fn memory_backends_start_empty() {
        let settings = HuddleSettings::default();
        let store = open_store(&StoreSettings {
            backend: StoreBackend::Memory,
            ..settings.store.clone()
        })
        .unwrap();
        assert!(store.recent(&"lobby".into(), 5).await.unwrap().is_empty());

        let directory = open_directory(&settings.directory).await.unwrap();
        assert!(directory.rooms_for(&"alice".into()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn server_boots_and_stops() {
        let mut settings = HuddleSettings::default();
        settings.server.host = "127.0.0.1".into();
        settings.server.port = 0;
        settings.store.backend = StoreBackend::Memory;

        let server = HuddleServer::new(
            &settings,
            open_directory(&settings.directory).await.unwrap(),
            open_store(&settings.store).unwrap(),
            huddle_server::metrics::detached_handle(),
        );
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        let drained = server
            .shutdown()
            .graceful_shutdown(vec![handle], Duration::from_secs(5))
            .await;
        assert!(drained);
        assert!(server.shutdown().token().is_cancelled());
    }
}
