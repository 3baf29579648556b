//! `r2d2` pools of `SQLite` connections.
//!
//! Every connection the pool opens goes through [`ConnectionSetup`]: WAL
//! journaling, foreign keys, the configured busy timeout and page cache,
//! a prepared statement cache large enough for every [`Statement`], and,
//! once the schema is known to be current, a warm-up that compiles the
//! whole statement set.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use rusqlite::types::FromSql;
use serde::{Deserialize, Serialize};

use crate::errors::{Entity, Result, SqliteResultExt};
use crate::sqlite::statements::{Statement, StatementCache};

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Alias for a pooled connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Pool and pragma settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Maximum pool size. In-memory pools always hold one.
    pub pool_size: u32,
    /// How long a statement waits on another writer's lock, in milliseconds.
    pub busy_timeout_ms: u32,
    /// Page cache per connection, KiB.
    pub cache_size_kib: i64,
    /// How long a checkout waits for a free connection, in milliseconds.
    pub connection_timeout_ms: u64,
}

impl ConnectionConfig {
    /// The busy timeout as a [`Duration`].
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.busy_timeout_ms))
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            pool_size: 16,
            busy_timeout_ms: 30_000,
            cache_size_kib: 8192,
            connection_timeout_ms: 5_000,
        }
    }
}

/// Runs once on each connection the pool opens.
#[derive(Debug)]
struct ConnectionSetup {
    busy_timeout_ms: u32,
    cache_size_kib: i64,
    statements: Option<Arc<StatementCache>>,
}

impl ConnectionSetup {
    fn new(config: &ConnectionConfig, statements: Option<Arc<StatementCache>>) -> Self {
        Self {
            busy_timeout_ms: config.busy_timeout_ms,
            cache_size_kib: config.cache_size_kib,
            statements,
        }
    }
}

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for ConnectionSetup {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = {};\
             PRAGMA foreign_keys = ON;\
             PRAGMA cache_size = -{};\
             PRAGMA synchronous = NORMAL;",
            self.busy_timeout_ms, self.cache_size_kib
        ))?;
        conn.set_prepared_statement_cache_capacity(Statement::ALL.len());
        match &self.statements {
            Some(statements) => statements.warm(conn),
            None => Ok(()),
        }
    }
}

/// Create an in-memory pool.
///
/// Every in-memory `SQLite` connection is a separate database, so the pool
/// holds exactly one connection and never recycles it. That connection is
/// opened before any schema exists; warm it with
/// [`StatementCache::warm`] after migrating.
pub fn new_in_memory(config: &ConnectionConfig) -> Result<ConnectionPool> {
    let pool = Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
        .connection_customizer(Box::new(ConnectionSetup::new(config, None)))
        .build(SqliteConnectionManager::memory())?;
    Ok(pool)
}

/// Create a file-backed pool. The file is created if absent.
///
/// With `statements`, every connection is warmed as it is opened and a
/// connection whose warm-up fails is never handed out, so the schema must
/// already be current.
pub fn new_file(
    path: &Path,
    config: &ConnectionConfig,
    statements: Option<Arc<StatementCache>>,
) -> Result<ConnectionPool> {
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
        .connection_customizer(Box::new(ConnectionSetup::new(config, statements)))
        .build(SqliteConnectionManager::file(path))?;
    Ok(pool)
}

/// Read back the pragmas a connection is running with.
pub fn verify_pragmas(conn: &Connection) -> Result<PragmaState> {
    Ok(PragmaState {
        journal_mode: pragma(conn, "journal_mode")?,
        foreign_keys_enabled: pragma::<i64>(conn, "foreign_keys")? == 1,
        busy_timeout_ms: pragma(conn, "busy_timeout")?,
    })
}

fn pragma<T: FromSql>(conn: &Connection, name: &str) -> Result<T> {
    conn.query_row(&format!("PRAGMA {name}"), [], |row| row.get(0))
        .for_entity(Entity::Statement)
}

/// Pragmas a connection is running with.
#[derive(Debug)]
pub struct PragmaState {
    /// `wal` for files, `memory` for in-memory databases.
    pub journal_mode: String,
    /// Whether foreign keys are enforced.
    pub foreign_keys_enabled: bool,
    /// Current busy timeout.
    pub busy_timeout_ms: i64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
