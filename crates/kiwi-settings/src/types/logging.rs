//! Logging settings.

use serde::{Deserialize, Serialize};

/// Log filter and output format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive (`error`..`trace`, or a full `EnvFilter`
    /// directive). `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit one JSON object per event instead of compact text.
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
