//! # huddle-settings
//!
//! Layered configuration for the Huddle chat server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** ([`HuddleSettings::default()`])
//! 2. **Settings file** (`--config` or `~/.huddle/settings.json`, deep-merged over defaults)
//! 3. **Environment variables** (`HUDDLE_*` overrides, highest priority)
//!
//! The loaded value is passed explicitly to the server; there is no global.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
