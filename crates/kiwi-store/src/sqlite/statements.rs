//! The fixed set of queries the store issues.
//!
//! Each query is a [`Statement`] variant, so an unknown or misspelled query
//! cannot exist at runtime. [`StatementCache::prepare_all`] compiles the whole
//! set against the live schema once at startup and fails on the first
//! statement that does not compile. The resulting cache is then handed to
//! the connection pool, which runs [`StatementCache::warm`] on every
//! connection it opens, so no request ever pays for compiling a query.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use rusqlite::{CachedStatement, Connection};
use tracing::debug;

use crate::errors::{Result, StoreError};

/// One named query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Statement {
    /// Insert a user.
    CreateUser,
    /// Fetch a user by id or username.
    GetUser,
    /// Fetch a user's passphrase hash by username.
    GetUserPassphrase,
    /// Change a user's display name.
    UpdateUser,
    /// Delete a user (cascades to stations).
    DeleteUser,
    /// Insert a station.
    CreateStation,
    /// Fetch a station.
    GetStation,
    /// Change a station's title and domain.
    UpdateStation,
    /// Delete a station (cascades to relays and tags).
    DeleteStation,
    /// Insert a relay, returning its id.
    CreateRelay,
    /// Replace a relay's mutable fields.
    UpdateRelay,
    /// Delete a relay row.
    DeleteRelay,
    /// Delete every join row of a relay.
    DeleteRelayTags,
    /// Fetch a relay by id.
    GetRelayById,
    /// Fetch a relay by station and alias.
    GetRelayByAlias,
    /// Fetch the owning station of a relay.
    GetRelayStation,
    /// List a station's relays.
    GetStationRelays,
    /// List a station's relays carrying a tag label.
    GetRelaysByTag,
    /// Insert a tag, returning its id.
    CreateTag,
    /// Fetch the owning station of a tag.
    GetTagStation,
    /// Delete a tag row.
    DeleteTag,
    /// Delete every join row of a tag.
    DeleteTagRelays,
    /// List a station's tags.
    GetStationTags,
    /// List the tags attached to a relay.
    GetRelayTags,
    /// Insert a join row.
    TagRelay,
    /// Delete a join row.
    UntagRelay,
}

impl Statement {
    /// Every statement, in declaration order.
    pub const ALL: &'static [Statement] = &[
        Self::CreateUser,
        Self::GetUser,
        Self::GetUserPassphrase,
        Self::UpdateUser,
        Self::DeleteUser,
        Self::CreateStation,
        Self::GetStation,
        Self::UpdateStation,
        Self::DeleteStation,
        Self::CreateRelay,
        Self::UpdateRelay,
        Self::DeleteRelay,
        Self::DeleteRelayTags,
        Self::GetRelayById,
        Self::GetRelayByAlias,
        Self::GetRelayStation,
        Self::GetStationRelays,
        Self::GetRelaysByTag,
        Self::CreateTag,
        Self::GetTagStation,
        Self::DeleteTag,
        Self::DeleteTagRelays,
        Self::GetStationTags,
        Self::GetRelayTags,
        Self::TagRelay,
        Self::UntagRelay,
    ];

    /// SQL text of this statement.
    #[allow(clippy::too_many_lines)]
    pub fn sql(self) -> &'static str {
        match self {
            Self::CreateUser => {
                "INSERT INTO users (id, username, display_name, passphrase_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)"
            }
            Self::GetUser => {
                "SELECT id, username, display_name, created_at
                 FROM users WHERE id = ?1 OR username = ?1"
            }
            Self::GetUserPassphrase => "SELECT passphrase_hash FROM users WHERE username = ?1",
            Self::UpdateUser => "UPDATE users SET display_name = ?1 WHERE id = ?2",
            Self::DeleteUser => "DELETE FROM users WHERE id = ?1",
            Self::CreateStation => {
                "INSERT INTO stations (id, user_id, created_at) VALUES (?1, ?2, ?3)"
            }
            Self::GetStation => {
                "SELECT id, user_id, title, domain, created_at FROM stations WHERE id = ?1"
            }
            Self::UpdateStation => "UPDATE stations SET title = ?1, domain = ?2 WHERE id = ?3",
            Self::DeleteStation => "DELETE FROM stations WHERE id = ?1",
            Self::CreateRelay => {
                "INSERT INTO relays (title, alias, destination, note, station_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 RETURNING id"
            }
            Self::UpdateRelay => {
                "UPDATE relays
                 SET title = ?1, alias = ?2, destination = ?3, note = ?4, updated_at = ?5
                 WHERE id = ?6"
            }
            Self::DeleteRelay => "DELETE FROM relays WHERE id = ?1",
            Self::DeleteRelayTags => "DELETE FROM relay_tags WHERE relay_id = ?1",
            Self::GetRelayById => concat!(
                "SELECT r.id, r.title, r.alias, r.destination, r.note, r.station_id, r.created_at, r.updated_at",
                " FROM relays r WHERE r.id = ?1"
            ),
            Self::GetRelayByAlias => concat!(
                "SELECT r.id, r.title, r.alias, r.destination, r.note, r.station_id, r.created_at, r.updated_at",
                " FROM relays r WHERE r.station_id = ?1 AND r.alias = ?2"
            ),
            Self::GetRelayStation => "SELECT station_id FROM relays WHERE id = ?1",
            Self::GetStationRelays => concat!(
                "SELECT r.id, r.title, r.alias, r.destination, r.note, r.station_id, r.created_at, r.updated_at",
                " FROM relays r WHERE r.station_id = ?1 ORDER BY r.id"
            ),
            Self::GetRelaysByTag => concat!(
                "SELECT r.id, r.title, r.alias, r.destination, r.note, r.station_id, r.created_at, r.updated_at",
                " FROM tags t",
                " JOIN relay_tags rt ON rt.tag_id = t.id AND rt.station_id = t.station_id",
                " JOIN relays r ON r.id = rt.relay_id AND r.station_id = rt.station_id",
                " WHERE t.station_id = ?2 AND t.label = ?1",
                " ORDER BY r.id"
            ),
            Self::CreateTag => "INSERT INTO tags (label, station_id) VALUES (?1, ?2) RETURNING id",
            Self::GetTagStation => "SELECT station_id FROM tags WHERE id = ?1",
            Self::DeleteTag => "DELETE FROM tags WHERE id = ?1",
            Self::DeleteTagRelays => "DELETE FROM relay_tags WHERE tag_id = ?1",
            Self::GetStationTags => {
                "SELECT id, label, station_id FROM tags WHERE station_id = ?1 ORDER BY label"
            }
            Self::GetRelayTags => {
                "SELECT t.id, t.label, t.station_id
                 FROM relay_tags rt
                 JOIN tags t ON t.id = rt.tag_id AND t.station_id = rt.station_id
                 WHERE rt.relay_id = ?1
                 ORDER BY t.label"
            }
            Self::TagRelay => {
                "INSERT INTO relay_tags (relay_id, tag_id, station_id) VALUES (?1, ?2, ?3)"
            }
            Self::UntagRelay => "DELETE FROM relay_tags WHERE relay_id = ?1 AND tag_id = ?2",
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The verified statement set and the warm-up applied to pooled connections.
#[derive(Debug)]
pub struct StatementCache {
    statements: &'static [Statement],
    warmed: AtomicUsize,
}

impl StatementCache {
    /// Compile every [`Statement`] on `conn`, leaving it warm.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] naming the first statement that
    /// failed to compile. No cache is returned in that case.
    pub fn prepare_all(conn: &Connection) -> Result<Self> {
        compile(conn, Statement::ALL).map_err(|(stmt, e)| {
            StoreError::unavailable(format!("preparing statement {stmt}"), e)
        })?;
        debug!(count = Statement::ALL.len(), "prepared statement set");
        Ok(Self {
            statements: Statement::ALL,
            warmed: AtomicUsize::new(0),
        })
    }

    /// Fill `conn`'s prepared statement cache with the whole set.
    ///
    /// The error message names the statement that failed.
    pub fn warm(&self, conn: &Connection) -> rusqlite::Result<()> {
        compile(conn, self.statements).map_err(|(stmt, e)| match e {
            rusqlite::Error::SqliteFailure(code, msg) => rusqlite::Error::SqliteFailure(
                code,
                Some(format!("preparing statement {stmt}: {}", msg.unwrap_or_default())),
            ),
            other => other,
        })?;
        let _ = self.warmed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Number of pooled connections warmed so far.
    pub fn warmed_connections(&self) -> usize {
        self.warmed.load(Ordering::Relaxed)
    }

    /// Statements in the verified set.
    pub fn statements(&self) -> &'static [Statement] {
        self.statements
    }

    /// Number of statements in the verified set.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

fn compile(
    conn: &Connection,
    statements: &[Statement],
) -> std::result::Result<(), (Statement, rusqlite::Error)> {
    for &stmt in statements {
        let _ = conn.prepare_cached(stmt.sql()).map_err(|e| (stmt, e))?;
    }
    Ok(())
}

/// Cached preparation of [`Statement`]s on a connection.
pub(crate) trait StatementExt {
    /// Fetch the compiled form of `stmt`, compiling it on first use.
    fn statement(&self, stmt: Statement) -> rusqlite::Result<CachedStatement<'_>>;
}

impl StatementExt for Connection {
    fn statement(&self, stmt: Statement) -> rusqlite::Result<CachedStatement<'_>> {
        self.prepare_cached(stmt.sql())
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use std::collections::HashSet;

    use assert_matches::assert_matches;

    use super::*;
    use crate::errors::ErrorKind;
    use crate::sqlite::migrations::{run_migrations, MigrationSource};

    const RELAY_COLUMNS: &str =
        "r.id, r.title, r.alias, r.destination, r.note, r.station_id, r.created_at, r.updated_at";

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn, &MigrationSource::Embedded).unwrap();
        conn
    }

    fn plan(conn: &Connection, sql: &str, params: &[&str]) -> Vec<String> {
        let mut stmt = conn.prepare(&format!("EXPLAIN QUERY PLAN {sql}")).unwrap();
        stmt.query_map(rusqlite::params_from_iter(params), |row| row.get::<_, String>(3))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn all_lists_every_statement_once() {
        let unique: HashSet<_> = Statement::ALL.iter().collect();
        assert_eq!(unique.len(), Statement::ALL.len());
    }

    #[test]
    fn relay_queries_share_column_order() {
        for stmt in [
            Statement::GetRelayById,
            Statement::GetRelayByAlias,
            Statement::GetStationRelays,
            Statement::GetRelaysByTag,
        ] {
            assert!(stmt.sql().starts_with(&format!("SELECT {RELAY_COLUMNS}")), "{stmt}");
        }
    }

    #[test]
    fn prepare_all_succeeds_on_current_schema() {
        let conn = setup();
        let cache = StatementCache::prepare_all(&conn).unwrap();
        assert_eq!(cache.len(), Statement::ALL.len());
        assert!(!cache.is_empty());
    }

    #[test]
    fn prepare_all_fails_on_unmigrated_schema() {
        let conn = Connection::open_in_memory().unwrap();
        let err = StatementCache::prepare_all(&conn).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_matches!(err, StoreError::Unavailable { ref context, .. } if context.contains("CreateUser"));
    }

    #[test]
    fn warm_counts_connections_and_names_failures() {
        let conn = setup();
        let cache = StatementCache::prepare_all(&conn).unwrap();
        assert_eq!(cache.warmed_connections(), 0);

        cache.warm(&setup()).unwrap();
        cache.warm(&setup()).unwrap();
        assert_eq!(cache.warmed_connections(), 2);

        let err = cache.warm(&Connection::open_in_memory().unwrap()).unwrap_err();
        assert!(err.to_string().contains("preparing statement CreateUser"), "{err}");
        assert_eq!(cache.warmed_connections(), 2);
    }

    #[test]
    fn alias_lookup_uses_station_alias_index() {
        let conn = setup();
        let details = plan(&conn, Statement::GetRelayByAlias.sql(), &["s1", "ex"]);
        assert!(
            details.iter().any(|d| d.contains("idx_relays_station_alias")),
            "plan: {details:?}"
        );
        assert!(!details.iter().any(|d| d.starts_with("SCAN")), "plan: {details:?}");
    }

    #[test]
    fn tag_lookup_never_scans() {
        let conn = setup();
        let details = plan(&conn, Statement::GetRelaysByTag.sql(), &["news", "s1"]);
        assert!(!details.iter().any(|d| d.starts_with("SCAN")), "plan: {details:?}");
    }
}
