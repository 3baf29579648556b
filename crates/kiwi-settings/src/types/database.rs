//! Database settings.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Database file name under the settings directory.
pub const DEFAULT_DB_FILENAME: &str = "kiwi.sqlite";

/// Where the store lives and how it talks to `SQLite`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Database file. Defaults to `~/.kiwi/kiwi.sqlite`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Directory of `NNN_name.sql` migration scripts. When unset, the
    /// scripts compiled into the binary are used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrations_dir: Option<PathBuf>,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// `SQLite` busy timeout.
    pub busy_timeout_ms: u32,
    /// Page cache per connection, KiB.
    pub cache_size_kib: i64,
    /// Pool checkout timeout.
    pub connection_timeout_ms: u64,
    /// Deadline for a single store call. `0` means no deadline.
    pub op_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            migrations_dir: None,
            pool_size: 16,
            busy_timeout_ms: 30_000,
            cache_size_kib: 8192,
            connection_timeout_ms: 5_000,
            op_timeout_ms: 10_000,
        }
    }
}

impl DatabaseSettings {
    /// Configured path, or the default under `kiwi_dir`.
    pub fn resolved_path(&self, kiwi_dir: &std::path::Path) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| kiwi_dir.join(DEFAULT_DB_FILENAME))
    }
}
