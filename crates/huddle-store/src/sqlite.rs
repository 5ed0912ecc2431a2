//! `SQLite`-backed message store.
//!
//! All database work runs on the blocking pool; the async methods only move
//! owned values in and out of [`tokio::task::spawn_blocking`].

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use huddle_core::{ChatMessage, RoomId};
use rusqlite::{Connection, params};
use tracing::debug;

use crate::connection::{self, ConnectionConfig, ConnectionPool};
use crate::errors::{Result, StoreError};
use crate::migrations::run_migrations;
use crate::store::MessageStore;

/// Message store persisting to a `messages` table.
#[derive(Clone)]
pub struct SqliteMessageStore {
    pool: ConnectionPool,
}

impl std::fmt::Debug for SqliteMessageStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMessageStore")
            .field("max_size", &self.pool.max_size())
            .finish_non_exhaustive()
    }
}

impl SqliteMessageStore {
    /// Open (or create) the database at `path` and apply migrations.
    pub fn open(path: &str, config: &ConnectionConfig) -> Result<Self> {
        Self::from_pool(connection::new_file(path, config)?)
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::from_pool(connection::new_in_memory(&ConnectionConfig::default())?)
    }

    fn from_pool(pool: ConnectionPool) -> Result<Self> {
        let conn = pool.get()?;
        let applied = run_migrations(&conn)?;
        debug!(applied, "message store ready");
        drop(conn);
        Ok(Self { pool })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await?
    }
}

fn insert(conn: &Connection, message: &ChatMessage) -> Result<()> {
    let _ = conn.execute(
        "INSERT INTO messages (room_id, sender_id, receiver_id, message, timestamp, is_read)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            message.room_id.as_str(),
            message.sender_id.as_str(),
            message.receiver_id.as_str(),
            message.message,
            message.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            message.is_read,
        ],
    )?;
    Ok(())
}

fn select_recent(conn: &Connection, room_id: &str, limit: usize) -> Result<Vec<ChatMessage>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare_cached(
        "SELECT room_id, sender_id, receiver_id, message, timestamp, is_read
         FROM messages
         WHERE room_id = ?1
         ORDER BY timestamp DESC, id DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![room_id, limit], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, bool>(5)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (room_id, sender_id, receiver_id, message, timestamp, is_read) = row?;
        let timestamp = DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| StoreError::CorruptRow(format!("timestamp {timestamp:?}: {e}")))?
            .with_timezone(&Utc);
        out.push(ChatMessage {
            room_id: room_id.into(),
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            message,
            timestamp,
            is_read,
        });
    }
    Ok(out)
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn store(&self, message: ChatMessage) -> Result<()> {
        self.with_conn(move |conn| insert(conn, &message)).await
    }

    async fn recent(&self, room_id: &RoomId, limit: usize) -> Result<Vec<ChatMessage>> {
        let room_id = room_id.to_string();
        self.with_conn(move |conn| select_recent(conn, &room_id, limit))
            .await
    }
}
