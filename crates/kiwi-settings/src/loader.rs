//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`KiwiSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `KIWI_*` environment overrides (highest priority)
//! 4. [`KiwiSettings::validate`] the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::KiwiSettings;

/// Env var naming an alternative settings file.
pub const SETTINGS_PATH_ENV: &str = "KIWI_SETTINGS";

/// The per-user directory holding settings and the default database
/// (`~/.kiwi`).
pub fn kiwi_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".kiwi")
}

/// Resolve the settings file: `$KIWI_SETTINGS`, else `~/.kiwi/settings.json`.
pub fn settings_path() -> PathBuf {
    read_env_string(SETTINGS_PATH_ENV)
        .map_or_else(|| kiwi_dir().join("settings.json"), PathBuf::from)
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<KiwiSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Unreadable files, invalid JSON and
/// values that fail validation are errors.
pub fn load_settings_from_path(path: &Path) -> Result<KiwiSettings> {
    let mut settings = load_file(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn load_file(path: &Path) -> Result<KiwiSettings> {
    let defaults = serde_json::to_value(KiwiSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `KIWI_*` environment variable overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut KiwiSettings) {
    apply_overrides(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup`.
///
/// Each variable has strict parsing rules:
/// - Integers must be valid and within the specified range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are ignored with a warning (file/default value stays)
pub fn apply_overrides(settings: &mut KiwiSettings, lookup: impl Fn(&str) -> Option<String>) {
    let env = Env(lookup);

    // ── Database ────────────────────────────────────────────────────
    if let Some(v) = env.string("KIWI_DB_PATH") {
        settings.database.path = Some(PathBuf::from(v));
    }
    if let Some(v) = env.string("KIWI_MIGRATIONS_DIR") {
        settings.database.migrations_dir = Some(PathBuf::from(v));
    }
    if let Some(v) = env.u32("KIWI_POOL_SIZE", 1, 256) {
        settings.database.pool_size = v;
    }
    if let Some(v) = env.u32("KIWI_BUSY_TIMEOUT_MS", 0, 600_000) {
        settings.database.busy_timeout_ms = v;
    }
    if let Some(v) = env.u64("KIWI_OP_TIMEOUT_MS", 0, 3_600_000) {
        settings.database.op_timeout_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("KIWI_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("KIWI_LOG_JSON") {
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

/// Parse a string as a `u32` within a range.
pub fn parse_u32_range(val: &str, min: u32, max: u32) -> Option<u32> {
    let n: u32 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}

// ── Variable readers (thin wrappers) ────────────────────────────────────────

struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.0)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.0)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u32(&self, name: &str, min: u32, max: u32) -> Option<u32> {
        let val = (self.0)(name)?;
        let result = parse_u32_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, min, max, "invalid u32 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.0)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, min, max, "invalid u64 env var, ignoring");
        }
        result
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn overrides(pairs: &[(&str, &str)]) -> KiwiSettings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut settings = KiwiSettings::default();
        apply_overrides(&mut settings, |name| vars.get(name).cloned());
        settings
    }

    // ── deep_merge ──────────────────────────────────────────────────

    #[test]
    fn merge_nested_override() {
        let target = serde_json::json!({"database": {"poolSize": 16, "busyTimeoutMs": 30000}});
        let source = serde_json::json!({"database": {"poolSize": 4}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["database"]["poolSize"], 4);
        assert_eq!(merged["database"]["busyTimeoutMs"], 30000);
    }

    #[test]
    fn merge_null_preserves_target() {
        let target = serde_json::json!({"a": 1, "b": 2});
        let source = serde_json::json!({"a": null});
        let merged = deep_merge(target, source);
        assert_eq!(merged["a"], 1);
        assert_eq!(merged["b"], 2);
    }

    #[test]
    fn merge_array_replace() {
        let target = serde_json::json!({"items": [1, 2, 3]});
        let source = serde_json::json!({"items": [4]});
        assert_eq!(deep_merge(target, source)["items"], serde_json::json!([4]));
    }

    #[test]
    fn merge_adds_new_keys() {
        let target = serde_json::json!({"database": {}});
        let source = serde_json::json!({"database": {"path": "/srv/kiwi.db"}});
        assert_eq!(deep_merge(target, source)["database"]["path"], "/srv/kiwi.db");
    }

    // ── load_settings_from_path ─────────────────────────────────────

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_file(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings, KiwiSettings::default());
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"database": {"path": "/srv/kiwi.db", "poolSize": 4}, "logging": {"json": true}}"#,
        )
        .unwrap();

        let settings = load_file(&path).unwrap();
        assert_eq!(settings.database.path, Some(PathBuf::from("/srv/kiwi.db")));
        assert_eq!(settings.database.pool_size, 4);
        assert_eq!(settings.database.busy_timeout_ms, 30_000);
        assert!(settings.logging.json);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn load_invalid_json_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not valid json").unwrap();
        assert!(matches!(load_file(&path).unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_wrong_type_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"database": {"poolSize": "many"}}"#).unwrap();
        assert!(matches!(load_file(&path).unwrap_err(), SettingsError::Json(_)));
    }

    #[test]
    fn load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"database": {"poolSize": 0}}"#).unwrap();
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(_)));
    }

    // ── overrides ───────────────────────────────────────────────────

    #[test]
    fn overrides_apply_valid_values() {
        let settings = overrides(&[
            ("KIWI_DB_PATH", "/data/kiwi.sqlite"),
            ("KIWI_MIGRATIONS_DIR", "/data/migrations"),
            ("KIWI_POOL_SIZE", "4"),
            ("KIWI_BUSY_TIMEOUT_MS", "1000"),
            ("KIWI_OP_TIMEOUT_MS", "0"),
            ("KIWI_LOG_LEVEL", "kiwi_store=debug"),
            ("KIWI_LOG_JSON", "yes"),
        ]);
        assert_eq!(settings.database.path, Some(PathBuf::from("/data/kiwi.sqlite")));
        assert_eq!(settings.database.migrations_dir, Some(PathBuf::from("/data/migrations")));
        assert_eq!(settings.database.pool_size, 4);
        assert_eq!(settings.database.busy_timeout_ms, 1000);
        assert_eq!(settings.database.op_timeout_ms, 0);
        assert_eq!(settings.logging.level, "kiwi_store=debug");
        assert!(settings.logging.json);
    }

    #[test]
    fn overrides_ignore_invalid_values() {
        let settings = overrides(&[
            ("KIWI_DB_PATH", ""),
            ("KIWI_POOL_SIZE", "0"),
            ("KIWI_BUSY_TIMEOUT_MS", "soon"),
            ("KIWI_OP_TIMEOUT_MS", "-5"),
            ("KIWI_LOG_JSON", "maybe"),
        ]);
        assert_eq!(settings, KiwiSettings::default());
    }

    // ── parsing ─────────────────────────────────────────────────────

    #[test]
    fn parse_bool_variants() {
        for val in ["true", "1", "yes", "on", "TRUE", "On"] {
            assert_eq!(parse_bool(val), Some(true), "failed for {val}");
        }
        for val in ["false", "0", "no", "off", "FALSE", "Off"] {
            assert_eq!(parse_bool(val), Some(false), "failed for {val}");
        }
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    #[test]
    fn parse_u32_bounds() {
        assert_eq!(parse_u32_range("1", 1, 256), Some(1));
        assert_eq!(parse_u32_range("256", 1, 256), Some(256));
        assert_eq!(parse_u32_range("257", 1, 256), None);
        assert_eq!(parse_u32_range("0", 1, 256), None);
        assert_eq!(parse_u32_range("x", 1, 256), None);
    }

    #[test]
    fn parse_u64_bounds() {
        assert_eq!(parse_u64_range("30000", 0, 3_600_000), Some(30_000));
        assert_eq!(parse_u64_range("3600001", 0, 3_600_000), None);
        assert_eq!(parse_u64_range("", 0, 3_600_000), None);
    }
}
