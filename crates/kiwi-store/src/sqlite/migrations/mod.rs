//! Schema migration runner for the relay database.
//!
//! Migrations come from a [`MigrationSource`]: either the scripts embedded
//! at compile time via [`include_str!`], or `<version>_<name>.sql` /
//! `<version>_<name>.up.sql` files discovered in a directory. Each step runs
//! inside its own `IMMEDIATE` transaction together with its
//! `schema_version` row, so a failure rolls back cleanly with no partial
//! schema state and concurrent starters never apply a step twice.
//!
//! Running the migrator is idempotent: already-applied versions are skipped.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::errors::MigrationError;

type Result<T> = std::result::Result<T, MigrationError>;

/// A single migration with a version number and SQL to execute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Migration {
    /// Version, strictly increasing across the source.
    pub version: u32,
    /// Human-readable description recorded in `schema_version`.
    pub description: Cow<'static, str>,
    /// SQL batch.
    pub sql: Cow<'static, str>,
}

/// Embedded migrations in version order.
const EMBEDDED: &[Migration] = &[
    Migration {
        version: 1,
        description: Cow::Borrowed("Users, stations, relays, tags and relay_tags"),
        sql: Cow::Borrowed(include_str!("v001_schema.sql")),
    },
    Migration {
        version: 2,
        description: Cow::Borrowed("Tag lookup index on relay_tags"),
        sql: Cow::Borrowed(include_str!("v002_relay_tags_tag_index.sql")),
    },
];

static SCRIPT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)_([^.]+)(?:\.up)?\.sql$").expect("static migration name pattern")
});

/// Where migration steps come from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MigrationSource {
    /// Scripts compiled into the binary.
    #[default]
    Embedded,
    /// Scripts read from a directory at startup.
    Directory(PathBuf),
}

impl MigrationSource {
    /// Load every step, ordered by version.
    pub fn load(&self) -> Result<Vec<Migration>> {
        match self {
            Self::Embedded => Ok(EMBEDDED.to_vec()),
            Self::Directory(dir) => load_directory(dir),
        }
    }
}

/// Open (or create) the database at `path` and apply pending migrations.
///
/// Returns the number of steps applied; `0` means the schema was current.
pub fn apply(source: &MigrationSource, path: &Path) -> Result<u32> {
    open_migrated(source, path).map(|(_, applied)| applied)
}

/// [`apply`], keeping the connection open for further setup.
pub(crate) fn open_migrated(source: &MigrationSource, path: &Path) -> Result<(Connection, u32)> {
    let open_err = |source| MigrationError::Open {
        path: path.display().to_string(),
        source,
    };
    let conn = Connection::open(path).map_err(open_err)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 30000;
         PRAGMA foreign_keys = ON;",
    )
    .map_err(open_err)?;
    let applied = run_migrations(&conn, source)?;
    Ok((conn, applied))
}

/// Run all pending migrations on the given connection.
///
/// Creates the `schema_version` table if it doesn't exist, then applies
/// each step whose version is not yet recorded, in version order.
///
/// # Errors
///
/// Returns [`MigrationError::Step`] naming the step that failed, or
/// [`MigrationError::UnknownVersion`] if the database is ahead of `source`.
pub fn run_migrations(conn: &Connection, source: &MigrationSource) -> Result<u32> {
    let migrations = source.load()?;
    ensure_version_table(conn)?;

    let recorded = applied_versions(conn)?;
    let latest = migrations.last().map_or(0, |m| m.version);
    if let Some(&found) = recorded.last() {
        if found > latest {
            return Err(MigrationError::UnknownVersion { found, latest });
        }
    }

    let mut applied = 0;
    for migration in &migrations {
        if recorded.contains(&migration.version) {
            debug!(
                version = migration.version,
                description = %migration.description,
                "migration already applied, skipping"
            );
            continue;
        }

        info!(
            version = migration.version,
            description = %migration.description,
            "applying migration"
        );

        if apply_migration(conn, migration)? {
            applied += 1;
        }
    }

    if applied > 0 {
        info!(applied, "migrations complete");
    }

    Ok(applied)
}

/// Return the highest applied migration version, or 0 if none.
pub fn current_version(conn: &Connection) -> Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .map_err(|source| MigrationError::Bookkeeping { source })
}

/// Return the latest migration version defined by `source`.
pub fn latest_version(source: &MigrationSource) -> Result<u32> {
    Ok(source.load()?.last().map_or(0, |m| m.version))
}

// ─────────────────────────────────────────────────────────────────────────────
// Internal
// ─────────────────────────────────────────────────────────────────────────────

fn load_directory(dir: &Path) -> Result<Vec<Migration>> {
    let source_err = |path: &Path, source| MigrationError::Source {
        path: path.display().to_string(),
        source,
    };

    let mut migrations = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| source_err(dir, e))? {
        let path = entry.map_err(|e| source_err(dir, e))?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Some(caps) = SCRIPT_NAME.captures(name) else {
            debug!(file = name, "not a migration script, ignoring");
            continue;
        };
        let version = match caps[1].parse::<u32>() {
            Ok(v) if v > 0 => v,
            _ => {
                warn!(file = name, "migration version out of range, ignoring");
                continue;
            }
        };
        let sql = std::fs::read_to_string(&path).map_err(|e| source_err(&path, e))?;
        migrations.push(Migration {
            version,
            description: Cow::Owned(caps[2].replace('_', " ")),
            sql: Cow::Owned(sql),
        });
    }

    migrations.sort_by_key(|m| m.version);
    if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
        return Err(MigrationError::DuplicateVersion {
            version: pair[0].version,
            path: dir.display().to_string(),
        });
    }
    Ok(migrations)
}

fn ensure_version_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
           version     INTEGER PRIMARY KEY,
           applied_at  TEXT    NOT NULL,
           description TEXT
         );",
    )
    .map_err(|source| MigrationError::Bookkeeping { source })
}

fn applied_versions(conn: &Connection) -> Result<BTreeSet<u32>> {
    let bookkeeping = |source| MigrationError::Bookkeeping { source };
    let mut stmt = conn
        .prepare("SELECT version FROM schema_version")
        .map_err(bookkeeping)?;
    let versions = stmt
        .query_map([], |row| row.get::<_, u32>(0))
        .map_err(bookkeeping)?
        .collect::<rusqlite::Result<BTreeSet<_>>>()
        .map_err(bookkeeping)?;
    Ok(versions)
}

/// Apply one step. Returns `false` if another connection applied it first.
fn apply_migration(conn: &Connection, migration: &Migration) -> Result<bool> {
    let step_err = |source| MigrationError::Step {
        version: migration.version,
        description: migration.description.to_string(),
        source,
    };

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate).map_err(step_err)?;

    let already: bool = tx
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM schema_version WHERE version = ?1)",
            [migration.version],
            |row| row.get(0),
        )
        .map_err(|source| MigrationError::Bookkeeping { source })?;
    if already {
        debug!(version = migration.version, "migration applied concurrently, skipping");
        return Ok(false);
    }

    tx.execute_batch(&migration.sql).map_err(step_err)?;

    let _ = tx
        .execute(
            "INSERT INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                chrono::Utc::now().to_rfc3339(),
                migration.description
            ],
        )
        .map_err(|source| MigrationError::Bookkeeping { source })?;

    tx.commit().map_err(step_err)?;

    Ok(true)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
