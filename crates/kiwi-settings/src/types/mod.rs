//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]`. Each type implements
//! [`Default`] with production values, and `#[serde(default)]` lets a file
//! name only the fields it changes.

mod database;
mod logging;

pub use database::*;
pub use logging::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "database": { "path": "/var/lib/kiwi/kiwi.sqlite", "poolSize": 8 },
///   "logging": { "level": "debug" }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KiwiSettings {
    /// Database location, pool and timeouts.
    pub database: DatabaseSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl KiwiSettings {
    /// Reject values the store cannot run with.
    pub fn validate(&self) -> Result<()> {
        let db = &self.database;
        if db.pool_size == 0 {
            return Err(SettingsError::InvalidValue("database.poolSize must be at least 1".into()));
        }
        if db.connection_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "database.connectionTimeoutMs must be at least 1".into(),
            ));
        }
        if db.path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            return Err(SettingsError::InvalidValue("database.path must not be empty".into()));
        }
        if self.logging.level.trim().is_empty() {
            return Err(SettingsError::InvalidValue("logging.level must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        KiwiSettings::default().validate().unwrap();
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(KiwiSettings::default()).unwrap();
        assert_eq!(json["database"]["poolSize"], 16);
        assert_eq!(json["database"]["busyTimeoutMs"], 30_000);
        assert_eq!(json["logging"]["level"], "info");
        assert_eq!(json["logging"]["json"], false);
    }

    #[test]
    fn zero_pool_is_rejected() {
        let mut settings = KiwiSettings::default();
        settings.database.pool_size = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("poolSize"));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: KiwiSettings =
            serde_json::from_str(r#"{"database": {"poolSize": 4}}"#).unwrap();
        assert_eq!(settings.database.pool_size, 4);
        assert_eq!(settings.database.busy_timeout_ms, 30_000);
        assert_eq!(settings.logging, LoggingSettings::default());
    }
}
