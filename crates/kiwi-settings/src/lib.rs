//! # kiwi-settings
//!
//! Layered configuration for the Relay Kiwi store and CLI.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`KiwiSettings::default()`]
//! 2. **Settings file** — `~/.kiwi/settings.json`, or the file named by
//!    `KIWI_SETTINGS` (deep-merged over defaults)
//! 3. **Environment variables** — `KIWI_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! let settings = kiwi_settings::load_settings()?;
//! println!("pool size: {}", settings.database.pool_size);
//! # Ok::<(), kiwi_settings::SettingsError>(())
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, kiwi_dir, load_settings, load_settings_from_path,
    settings_path,
};
pub use types::*;
