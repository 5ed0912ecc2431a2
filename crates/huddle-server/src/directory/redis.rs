//! Redis-backed room directory.
//!
//! Room records live under `{prefix}:{a}:{b}` keys whose value is
//!
//! ```json
//! {"roomID": "a_b", "user": {"a": {"username": "...", "avatar_url": null}}, "timestamp": 1700000000}
//! ```
//!
//! A participant's rooms are the keys matching `{prefix}:{id}:*` followed by
//! those matching `{prefix}:*:{id}`, in scan order.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use huddle_core::{ParticipantId, RoomId};
use huddle_core::routing::ROOM_ID_SEPARATOR;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{DirectoryError, ParticipantProfile, RoomDirectory, RoomRecord};

/// Keys requested per SCAN round trip.
const SCAN_COUNT: usize = 10;

#[derive(Debug, Deserialize)]
struct StoredRoom {
    #[serde(rename = "roomID", default)]
    room_id: String,
    #[serde(default)]
    user: BTreeMap<String, ParticipantProfile>,
}

/// Room directory reading room records from Redis.
#[derive(Clone)]
pub struct RedisRoomDirectory {
    conn: ConnectionManager,
    prefix: String,
}

impl std::fmt::Debug for RedisRoomDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRoomDirectory")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisRoomDirectory {
    /// Connect to `url` and read records under `prefix`.
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, DirectoryError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            prefix: prefix.into(),
        })
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, DirectoryError> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }
}

/// The two scan patterns for `participant`, in lookup order.
pub fn scan_patterns(prefix: &str, participant: &ParticipantId) -> [String; 2] {
    [
        format!("{prefix}:{participant}:*"),
        format!("{prefix}:*:{participant}"),
    ]
}

/// Room id encoded in a key: `{prefix}:a:b` becomes `a_b`.
pub fn room_id_from_key(prefix: &str, key: &str) -> RoomId {
    let rest = key
        .strip_prefix(prefix)
        .and_then(|r| r.strip_prefix(':'))
        .unwrap_or(key);
    let sep = ROOM_ID_SEPARATOR.to_string();
    RoomId::new(rest.split(':').collect::<Vec<_>>().join(&sep))
}

/// Build the record for `key` from its stored value.
///
/// A missing or undecodable value yields a bare record with the room id
/// taken from the key.
pub fn decode_record(prefix: &str, key: &str, value: Option<&str>) -> RoomRecord {
    let Some(raw) = value else {
        debug!(key, "room key vanished between scan and get");
        return RoomRecord::bare(room_id_from_key(prefix, key));
    };
    match serde_json::from_str::<StoredRoom>(raw) {
        Ok(stored) => {
            let room_id = if stored.room_id.is_empty() {
                room_id_from_key(prefix, key)
            } else {
                RoomId::new(stored.room_id)
            };
            RoomRecord {
                room_id,
                participants: stored
                    .user
                    .into_iter()
                    .map(|(id, profile)| (ParticipantId::new(id), profile))
                    .collect(),
            }
        }
        Err(e) => {
            warn!(key, error = %e, "undecodable room record, using key");
            RoomRecord::bare(room_id_from_key(prefix, key))
        }
    }
}

#[async_trait]
impl RoomDirectory for RedisRoomDirectory {
    async fn rooms_for(&self, participant: &ParticipantId) -> Result<Vec<RoomRecord>, DirectoryError> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for pattern in scan_patterns(&self.prefix, participant) {
            for key in self.scan(&pattern).await? {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
        }

        let mut conn = self.conn.clone();
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            let value: Option<String> = conn.get(&key).await?;
            records.push(decode_record(&self.prefix, &key, value.as_deref()));
        }
        debug!(%participant, rooms = records.len(), "resolved rooms from redis");
        Ok(records)
    }
}
