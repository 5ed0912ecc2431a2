//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`HuddleSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `HUDDLE_*` environment variable overrides (highest priority)
//! 4. Validate sizing values
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{DirectoryBackend, HuddleSettings, StoreBackend};

/// Resolve the default settings file (`~/.huddle/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".huddle").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<HuddleSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Invalid JSON or an invalid sizing value
/// is an error.
pub fn load_settings_from_path(path: &Path) -> Result<HuddleSettings> {
    let mut settings = load_file(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Load defaults merged with `path`, without consulting the environment.
pub fn load_file(path: &Path) -> Result<HuddleSettings> {
    let defaults = serde_json::to_value(HuddleSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Reject values the hub cannot run with.
pub fn validate(settings: &HuddleSettings) -> Result<()> {
    if settings.hub.mailbox_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "hub.mailboxCapacity must be > 0".to_string(),
        ));
    }
    if settings.hub.room_queue_capacity == 0 {
        return Err(SettingsError::InvalidValue(
            "hub.roomQueueCapacity must be > 0".to_string(),
        ));
    }
    if settings.store.pool_size == 0 {
        return Err(SettingsError::InvalidValue(
            "store.poolSize must be > 0".to_string(),
        ));
    }
    Ok(())
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are logged and ignored (falling back to file/default).
pub fn apply_env_overrides(settings: &mut HuddleSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup` instead of the process environment.
pub fn apply_overrides<F>(settings: &mut HuddleSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("HUDDLE_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("HUDDLE_PORT", 0, 65535) {
        settings.server.port = v;
    }

    // ── Hub ─────────────────────────────────────────────────────────
    if let Some(v) = env.usize("HUDDLE_MAILBOX_CAPACITY", 1, 1_000_000) {
        settings.hub.mailbox_capacity = v;
    }

    // ── Auth ────────────────────────────────────────────────────────
    if let Some(v) = env
        .string("HUDDLE_JWT_SECRET")
        .or_else(|| env.string("JWT_SECRET"))
    {
        settings.auth.jwt_secret = v;
    }

    // ── Directory ───────────────────────────────────────────────────
    if let Some(v) = env.string("HUDDLE_REDIS_URL") {
        settings.directory.redis_url = v;
    }
    if let Some(v) = env.parsed::<DirectoryBackend>("HUDDLE_DIRECTORY_BACKEND") {
        settings.directory.backend = v;
    }

    // ── Store ───────────────────────────────────────────────────────
    if let Some(v) = env.parsed::<StoreBackend>("HUDDLE_STORE_BACKEND") {
        settings.store.backend = v;
    }
    if let Some(v) = env.string("HUDDLE_DB_PATH") {
        settings.store.sqlite_path = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("HUDDLE_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("HUDDLE_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.lookup)(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }

    fn parsed<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        let val = self.string(name)?;
        match serde_json::from_value(Value::String(val.to_lowercase())) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key = name, value = %val, "unknown variant in env var, ignoring");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn deep_merge_primitives_replaced() {
        let result = deep_merge(json!(1), json!(2));
        assert_eq!(result, json!(2));
    }

    #[test]
    fn deep_merge_nested_objects() {
        let target = json!({"hub": {"mailboxCapacity": 256, "historyLimit": 10}});
        let source = json!({"hub": {"mailboxCapacity": 8}});
        let result = deep_merge(target, source);
        assert_eq!(result["hub"]["mailboxCapacity"], 8);
        assert_eq!(result["hub"]["historyLimit"], 10);
    }

    #[test]
    fn deep_merge_null_skipped() {
        let target = json!({"a": 1, "b": 2});
        let source = json!({"a": null, "b": 3});
        let result = deep_merge(target, source);
        assert_eq!(result, json!({"a": 1, "b": 3}));
    }

    #[test]
    fn deep_merge_new_keys_added() {
        let result = deep_merge(json!({"a": 1}), json!({"b": 2}));
        assert_eq!(result, json!({"a": 1, "b": 2}));
    }

    #[test]
    fn deep_merge_arrays_replaced() {
        let result = deep_merge(json!({"a": [1, 2, 3]}), json!({"a": [4]}));
        assert_eq!(result, json!({"a": [4]}));
    }

    // ── load_file ───────────────────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let settings = load_file(Path::new("/nonexistent/huddle/settings.json")).unwrap();
        assert_eq!(settings.server.port, 3001);
        assert_eq!(settings.hub.mailbox_capacity, 256);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"server": {"port": 4000}, "directory": {"backend": "redis", "redisUrl": null}}"#,
        )
        .unwrap();

        let settings = load_file(&path).unwrap();
        assert_eq!(settings.server.port, 4000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.directory.backend, DirectoryBackend::Redis);
        assert_eq!(settings.directory.redis_url, "redis://127.0.0.1:6379");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(matches!(err, SettingsError::Json(_)));
    }

    #[test]
    fn load_unknown_backend_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"store": {"backend": "mongo"}}"#).unwrap();
        assert!(load_file(&path).is_err());
    }

    // ── validate ────────────────────────────────────────────────────

    #[test]
    fn validate_accepts_defaults() {
        assert!(validate(&HuddleSettings::default()).is_ok());
    }

    #[test]
    fn validate_rejects_zero_mailbox() {
        let mut s = HuddleSettings::default();
        s.hub.mailbox_capacity = 0;
        let err = validate(&s).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
        assert!(err.to_string().contains("mailboxCapacity"));
    }

    #[test]
    fn validate_rejects_zero_room_queue() {
        let mut s = HuddleSettings::default();
        s.hub.room_queue_capacity = 0;
        assert!(validate(&s).is_err());
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply() {
        let mut s = HuddleSettings::default();
        apply_overrides(
            &mut s,
            lookup_from(&[
                ("HUDDLE_HOST", "127.0.0.1"),
                ("HUDDLE_PORT", "9000"),
                ("HUDDLE_MAILBOX_CAPACITY", "16"),
                ("HUDDLE_JWT_SECRET", "s3cret"),
                ("HUDDLE_REDIS_URL", "redis://cache:6379"),
                ("HUDDLE_DIRECTORY_BACKEND", "Redis"),
                ("HUDDLE_STORE_BACKEND", "memory"),
                ("HUDDLE_DB_PATH", "/var/lib/huddle.db"),
                ("HUDDLE_LOG_LEVEL", "debug"),
                ("HUDDLE_LOG_JSON", "yes"),
            ]),
        );
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.hub.mailbox_capacity, 16);
        assert_eq!(s.auth.jwt_secret, "s3cret");
        assert_eq!(s.directory.redis_url, "redis://cache:6379");
        assert_eq!(s.directory.backend, DirectoryBackend::Redis);
        assert_eq!(s.store.backend, StoreBackend::Memory);
        assert_eq!(s.store.sqlite_path, "/var/lib/huddle.db");
        assert_eq!(s.logging.level, "debug");
        assert!(s.logging.json);
    }

    #[test]
    fn jwt_secret_falls_back_to_plain_name() {
        let mut s = HuddleSettings::default();
        apply_overrides(&mut s, lookup_from(&[("JWT_SECRET", "legacy")]));
        assert_eq!(s.auth.jwt_secret, "legacy");

        let mut s = HuddleSettings::default();
        apply_overrides(
            &mut s,
            lookup_from(&[("JWT_SECRET", "legacy"), ("HUDDLE_JWT_SECRET", "new")]),
        );
        assert_eq!(s.auth.jwt_secret, "new");
    }

    #[test]
    fn invalid_overrides_ignored() {
        let mut s = HuddleSettings::default();
        apply_overrides(
            &mut s,
            lookup_from(&[
                ("HUDDLE_PORT", "99999"),
                ("HUDDLE_MAILBOX_CAPACITY", "0"),
                ("HUDDLE_STORE_BACKEND", "mongo"),
                ("HUDDLE_LOG_JSON", "maybe"),
                ("HUDDLE_HOST", ""),
            ]),
        );
        assert_eq!(s.server.port, 3001);
        assert_eq!(s.hub.mailbox_capacity, 256);
        assert_eq!(s.store.backend, StoreBackend::Sqlite);
        assert!(!s.logging.json);
        assert_eq!(s.server.host, "0.0.0.0");
    }

    // ── parse helpers ───────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for t in ["true", "TRUE", "1", "yes", "on"] {
            assert_eq!(parse_bool(t), Some(true), "{t}");
        }
        for f in ["false", "0", "no", "OFF"] {
            assert_eq!(parse_bool(f), Some(false), "{f}");
        }
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn parse_ranges() {
        assert_eq!(parse_u16_range("3001", 1, 65535), Some(3001));
        assert_eq!(parse_u16_range("0", 1, 65535), None);
        assert_eq!(parse_u16_range("abc", 1, 65535), None);
        assert_eq!(parse_usize_range("256", 1, 1000), Some(256));
        assert_eq!(parse_usize_range("2000", 1, 1000), None);
    }
}
