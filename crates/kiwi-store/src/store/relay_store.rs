//! High-level transactional `RelayStore` API.
//!
//! Owns the connection pool and the verified statement set. Every method
//! takes an [`OpContext`]: the context is checked before a connection is
//! checked out, a progress handler interrupts running statements once it is
//! done, lock waits are bounded by its deadline and re-check it between
//! short slices, and writes check it again just before `COMMIT`. A write is
//! only reported as successful once its transaction has committed.

use std::ops::Deref;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info};

use crate::context::OpContext;
use crate::errors::{Entity, ErrorKind, Result, SqliteResultExt, StoreError, is_busy};
use crate::passphrase;
use crate::sqlite::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::sqlite::migrations::{self, MigrationSource, run_migrations};
use crate::sqlite::repositories::{RelayRepo, StationRepo, TagRepo, UserRepo};
use crate::sqlite::statements::StatementCache;
use crate::types::{NewRelay, Relay, RelayId, RelayUpdate, Station, Tag, TagId, User, UserId};

/// Virtual machine instructions between cancellation checks.
const PROGRESS_INTERVAL: i32 = 1_000;

/// Longest single wait on another writer's lock before the context is
/// checked again.
const LOCK_WAIT_SLICE: Duration = Duration::from_millis(25);

/// How to open a [`RelayStore`].
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// Where schema steps come from.
    pub migrations: MigrationSource,
    /// Pool and pragma settings.
    pub connection: ConnectionConfig,
}

/// Pooled connection bound to one operation's context.
///
/// Statements are interrupted once the context is done and lock waits
/// never outlive its deadline. Dropping the guard restores the
/// connection's configured busy timeout and removes the progress handler.
struct ScopedConn {
    conn: PooledConnection,
    busy_timeout: Duration,
}

impl ScopedConn {
    fn new(conn: PooledConnection, ctx: &OpContext, busy_timeout: Duration) -> Result<Self> {
        let scoped = Self { conn, busy_timeout };
        let watched = AssertUnwindSafe(ctx.clone());
        scoped
            .conn
            .progress_handler(PROGRESS_INTERVAL, Some(move || watched.is_done()));
        scoped.wait_at_most(bounded(ctx, busy_timeout))?;
        Ok(scoped)
    }

    fn wait_at_most(&self, timeout: Duration) -> Result<()> {
        self.conn.busy_timeout(timeout).for_entity(Entity::Statement)
    }

    /// `BEGIN IMMEDIATE`, waiting for a competing writer in slices so that
    /// cancellation is noticed while the lock is held elsewhere.
    fn begin_immediate(&self, ctx: &OpContext, entity: Entity) -> Result<Transaction<'_>> {
        let started = Instant::now();
        loop {
            let left = self.busy_timeout.saturating_sub(started.elapsed());
            self.wait_at_most(bounded(ctx, left).min(LOCK_WAIT_SLICE))?;
            match Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate) {
                Ok(tx) => {
                    self.wait_at_most(bounded(ctx, self.busy_timeout))?;
                    return Ok(tx);
                }
                Err(e) if is_busy(&e) => {
                    ctx.check()?;
                    if started.elapsed() >= self.busy_timeout {
                        return Err(StoreError::from_sqlite(entity, e));
                    }
                }
                Err(e) => return Err(StoreError::from_sqlite(entity, e)),
            }
        }
    }
}

impl Deref for ScopedConn {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for ScopedConn {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
        let _ = self.conn.busy_timeout(self.busy_timeout);
    }
}

/// The context's remaining time, capped at `limit`.
fn bounded(ctx: &OpContext, limit: Duration) -> Duration {
    ctx.remaining().map_or(limit, |remaining| remaining.min(limit))
}

/// The relay service's persistent store.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct RelayStore {
    pool: ConnectionPool,
    statements: Arc<StatementCache>,
    busy_timeout: Duration,
}

impl RelayStore {
    /// Open the store: apply pending migrations, compile every statement
    /// against the migrated schema, then build a pool whose connections
    /// all start with the statement set compiled.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let (pool, statements, applied) = match &config.path {
            Some(path) => {
                let (bootstrap, applied) = migrations::open_migrated(&config.migrations, path)?;
                let statements = Arc::new(StatementCache::prepare_all(&bootstrap)?);
                drop(bootstrap);
                let pool =
                    connection::new_file(path, &config.connection, Some(Arc::clone(&statements)))?;
                (pool, statements, applied)
            }
            None => {
                let pool = connection::new_in_memory(&config.connection)?;
                let conn = pool.get()?;
                let applied = run_migrations(&conn, &config.migrations)?;
                let statements = Arc::new(StatementCache::prepare_all(&conn)?);
                // The pool's only connection, opened before the schema existed.
                statements
                    .warm(&conn)
                    .for_entity(Entity::Statement)?;
                drop(conn);
                (pool, statements, applied)
            }
        };

        let location = config
            .path
            .as_ref()
            .map_or_else(|| ":memory:".to_string(), |p| p.display().to_string());
        info!(
            path = %location,
            pool_size = pool.max_size(),
            migrations_applied = applied,
            statements = statements.len(),
            warmed_connections = statements.warmed_connections(),
            "relay store opened"
        );
        Ok(Self {
            pool,
            statements,
            busy_timeout: config.connection.busy_timeout(),
        })
    }

    /// Open a private in-memory store with the embedded schema.
    pub fn in_memory() -> Result<Self> {
        Self::open(&StoreConfig::default())
    }

    /// The verified statement set every pooled connection is warmed with.
    pub fn statements(&self) -> &Arc<StatementCache> {
        &self.statements
    }

    /// Close the store, releasing every pooled connection.
    pub fn close(self) {
        let state = self.pool.state();
        drop(self.pool);
        info!(
            connections = state.connections,
            idle = state.idle_connections,
            "relay store closed"
        );
    }

    // ─────────────────────────────────────────────────────────────────────
    // Connection plumbing
    // ─────────────────────────────────────────────────────────────────────

    fn checkout(&self, ctx: &OpContext) -> Result<ScopedConn> {
        ctx.check()?;
        let conn = match ctx.remaining() {
            Some(remaining) => self.pool.get_timeout(remaining).map_err(|e| {
                if ctx.is_done() {
                    StoreError::Cancelled
                } else {
                    e.into()
                }
            })?,
            None => self.pool.get()?,
        };
        ScopedConn::new(conn, ctx, self.busy_timeout)
    }

    fn read<T>(&self, ctx: &OpContext, op: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.checkout(ctx)?;
        op(&conn).map_err(|e| settle(ctx, e))
    }

    /// Run `op` in an immediate transaction and commit only if the context
    /// is still live. Any error rolls the transaction back.
    fn write<T>(
        &self,
        ctx: &OpContext,
        entity: Entity,
        op: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let conn = self.checkout(ctx)?;
        let tx = conn.begin_immediate(ctx, entity)?;
        let value = op(&tx).map_err(|e| settle(ctx, e))?;
        ctx.check()?;
        tx.commit().for_entity(entity).map_err(|e| settle(ctx, e))?;
        Ok(value)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────

    /// Create a user. The passphrase is stored as a salted argon2id hash.
    pub fn create_user(
        &self,
        ctx: &OpContext,
        username: &str,
        display_name: &str,
        passphrase: &str,
    ) -> Result<UserId> {
        require_non_empty("username", username)?;
        ctx.check()?;
        let hash = passphrase::hash(passphrase)?;
        let user = self.write(ctx, Entity::User, |conn| {
            UserRepo::create(conn, username, display_name, &hash)
        })?;
        debug!(user_id = %user.id, username, "user created");
        Ok(user.id)
    }

    /// Get a user by id or username.
    pub fn get_user(&self, ctx: &OpContext, id_or_username: &str) -> Result<User> {
        self.read(ctx, |conn| UserRepo::get(conn, id_or_username))?
            .ok_or_else(|| StoreError::not_found(Entity::User, id_or_username))
    }

    /// Check `passphrase` against the user's stored hash.
    pub fn verify_passphrase(
        &self,
        ctx: &OpContext,
        username: &str,
        passphrase: &str,
    ) -> Result<bool> {
        let stored = self
            .read(ctx, |conn| UserRepo::passphrase_hash(conn, username))?
            .ok_or_else(|| StoreError::not_found(Entity::User, username))?;
        passphrase::verify(passphrase, &stored)
    }

    /// Change a user's display name.
    pub fn update_user(&self, ctx: &OpContext, id: &str, display_name: &str) -> Result<()> {
        let changed = self.write(ctx, Entity::User, |conn| {
            UserRepo::update_display_name(conn, id, display_name)
        })?;
        found(changed, Entity::User, id)
    }

    /// Delete a user together with their stations and everything in them.
    pub fn delete_user(&self, ctx: &OpContext, id: &str) -> Result<()> {
        let changed = self.write(ctx, Entity::User, |conn| UserRepo::delete(conn, id))?;
        found(changed, Entity::User, id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Stations
    // ─────────────────────────────────────────────────────────────────────

    /// Create a station owned by `user_id`.
    pub fn create_station(&self, ctx: &OpContext, id: &str, user_id: &str) -> Result<()> {
        require_non_empty("station id", id)?;
        let _ = self.write(ctx, Entity::Station, |conn| StationRepo::create(conn, id, user_id))?;
        debug!(station_id = id, user_id, "station created");
        Ok(())
    }

    /// Get a station.
    pub fn get_station(&self, ctx: &OpContext, id: &str) -> Result<Station> {
        self.read(ctx, |conn| StationRepo::get(conn, id))?
            .ok_or_else(|| StoreError::not_found(Entity::Station, id))
    }

    /// Replace a station's title and domain.
    pub fn update_station(
        &self,
        ctx: &OpContext,
        id: &str,
        title: Option<&str>,
        domain: Option<&str>,
    ) -> Result<()> {
        let changed = self.write(ctx, Entity::Station, |conn| {
            StationRepo::update(conn, id, title, domain)
        })?;
        found(changed, Entity::Station, id)
    }

    /// Delete a station with its relays, tags and join rows.
    pub fn delete_station(&self, ctx: &OpContext, id: &str) -> Result<()> {
        let changed = self.write(ctx, Entity::Station, |conn| StationRepo::delete(conn, id))?;
        found(changed, Entity::Station, id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Relays
    // ─────────────────────────────────────────────────────────────────────

    /// Create a relay. The alias must be free within its station.
    pub fn create_relay(&self, ctx: &OpContext, relay: &NewRelay) -> Result<RelayId> {
        require_non_empty("alias", &relay.alias)?;
        let id = self.write(ctx, Entity::Relay, |conn| RelayRepo::create(conn, relay))?;
        debug!(relay_id = %id, station_id = %relay.station_id, alias = %relay.alias, "relay created");
        Ok(id)
    }

    /// Replace a relay's title, alias, destination and note.
    pub fn update_relay(&self, ctx: &OpContext, id: RelayId, update: &RelayUpdate) -> Result<()> {
        require_non_empty("alias", &update.alias)?;
        let changed = self.write(ctx, Entity::Relay, |conn| RelayRepo::update(conn, id, update))?;
        found(changed, Entity::Relay, id)
    }

    /// Delete a relay and its tag attachments atomically.
    pub fn delete_relay(&self, ctx: &OpContext, id: RelayId) -> Result<()> {
        self.write(ctx, Entity::Relay, |conn| {
            found(RelayRepo::delete(conn, id)?, Entity::Relay, id)
        })
    }

    /// Get a relay by id.
    pub fn get_relay_by_id(&self, ctx: &OpContext, id: RelayId) -> Result<Relay> {
        self.read(ctx, |conn| RelayRepo::get_by_id(conn, id))?
            .ok_or_else(|| StoreError::not_found(Entity::Relay, id))
    }

    /// Get a relay by exact alias within a station.
    pub fn get_relay_by_alias(
        &self,
        ctx: &OpContext,
        station_id: &str,
        alias: &str,
    ) -> Result<Relay> {
        self.read(ctx, |conn| RelayRepo::get_by_alias(conn, station_id, alias))?
            .ok_or_else(|| StoreError::not_found(Entity::Relay, format!("{station_id}/{alias}")))
    }

    /// All relays of a station, ordered by id. Unknown stations have none.
    pub fn get_station_relays(&self, ctx: &OpContext, station_id: &str) -> Result<Vec<Relay>> {
        self.read(ctx, |conn| RelayRepo::list_by_station(conn, station_id))
    }

    /// Relays of `station_id` tagged `label`, ordered by id.
    pub fn get_relays_by_tag(
        &self,
        ctx: &OpContext,
        label: &str,
        station_id: &str,
    ) -> Result<Vec<Relay>> {
        self.read(ctx, |conn| RelayRepo::list_by_tag(conn, label, station_id))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Tags
    // ─────────────────────────────────────────────────────────────────────

    /// Create a tag. The label must be free within its station.
    pub fn create_tag(&self, ctx: &OpContext, label: &str, station_id: &str) -> Result<TagId> {
        require_non_empty("label", label)?;
        let id = self.write(ctx, Entity::Tag, |conn| TagRepo::create(conn, label, station_id))?;
        debug!(tag_id = %id, station_id, label, "tag created");
        Ok(id)
    }

    /// Attach a tag to a relay of the same station.
    pub fn tag_relay(&self, ctx: &OpContext, relay_id: RelayId, tag_id: TagId) -> Result<()> {
        self.write(ctx, Entity::RelayTag, |conn| {
            let relay_station = RelayRepo::station_of(conn, relay_id)?
                .ok_or_else(|| StoreError::not_found(Entity::Relay, relay_id))?;
            let tag_station = TagRepo::station_of(conn, tag_id)?
                .ok_or_else(|| StoreError::not_found(Entity::Tag, tag_id))?;
            require_same_station(relay_id, &relay_station, tag_id, &tag_station)?;
            TagRepo::attach(conn, relay_id, tag_id, &relay_station)
        })
    }

    /// Detach a tag from a relay.
    pub fn untag_relay(&self, ctx: &OpContext, relay_id: RelayId, tag_id: TagId) -> Result<()> {
        let changed = self.write(ctx, Entity::RelayTag, |conn| {
            TagRepo::detach(conn, relay_id, tag_id)
        })?;
        found(changed, Entity::RelayTag, format!("{relay_id}/{tag_id}"))
    }

    /// Tags of a station, ordered by label.
    pub fn get_station_tags(&self, ctx: &OpContext, station_id: &str) -> Result<Vec<Tag>> {
        self.read(ctx, |conn| TagRepo::list_by_station(conn, station_id))
    }

    /// Tags attached to a relay, ordered by label.
    pub fn get_relay_tags(&self, ctx: &OpContext, relay_id: RelayId) -> Result<Vec<Tag>> {
        self.read(ctx, |conn| {
            if RelayRepo::station_of(conn, relay_id)?.is_none() {
                return Err(StoreError::not_found(Entity::Relay, relay_id));
            }
            TagRepo::list_by_relay(conn, relay_id)
        })
    }

    /// Delete a tag and its relay attachments atomically.
    pub fn delete_tag(&self, ctx: &OpContext, id: TagId) -> Result<()> {
        self.write(ctx, Entity::Tag, |conn| {
            found(TagRepo::delete(conn, id)?, Entity::Tag, id)
        })
    }
}

fn require_non_empty(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(StoreError::validation(format!("{what} must not be empty")));
    }
    Ok(())
}

fn require_same_station(
    relay_id: RelayId,
    relay_station: &str,
    tag_id: TagId,
    tag_station: &str,
) -> Result<()> {
    if relay_station != tag_station {
        return Err(StoreError::referential(
            Entity::RelayTag,
            format!(
                "relay {relay_id} belongs to station {relay_station} but tag {tag_id} belongs to {tag_station}"
            ),
        ));
    }
    Ok(())
}

/// A storage failure seen after the caller gave up is reported as
/// [`StoreError::Cancelled`].
fn settle(ctx: &OpContext, err: StoreError) -> StoreError {
    if err.kind() == ErrorKind::Unavailable && ctx.is_done() {
        StoreError::Cancelled
    } else {
        err
    }
}

fn found(changed: bool, entity: Entity, key: impl std::fmt::Display) -> Result<()> {
    if changed {
        Ok(())
    } else {
        Err(StoreError::not_found(entity, key))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use std::time::{Duration, Instant};

    use assert_matches::assert_matches;
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn store() -> (RelayStore, OpContext) {
        let store = RelayStore::in_memory().unwrap();
        let ctx = OpContext::background();
        let user = store.create_user(&ctx, "alice", "Alice", "pw").unwrap();
        store.create_station(&ctx, "s1", &user).unwrap();
        store.create_station(&ctx, "s2", &user).unwrap();
        (store, ctx)
    }

    fn new_relay(station: &str, alias: &str) -> NewRelay {
        NewRelay {
            title: alias.to_uppercase(),
            alias: alias.into(),
            destination: format!("https://example.com/{alias}"),
            note: String::new(),
            station_id: station.into(),
        }
    }

    #[test]
    fn store_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RelayStore>();
    }

    #[test]
    fn empty_inputs_are_validation_errors() {
        let (store, ctx) = store();
        let err = store.create_relay(&ctx, &new_relay("s1", "")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(store.create_tag(&ctx, "", "s1").unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(
            store.create_user(&ctx, "", "x", "pw").unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            store.create_station(&ctx, "", "u").unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn passphrase_round_trip() {
        let (store, ctx) = store();
        assert!(store.verify_passphrase(&ctx, "alice", "pw").unwrap());
        assert!(!store.verify_passphrase(&ctx, "alice", "PW").unwrap());
        assert!(store.verify_passphrase(&ctx, "bob", "pw").unwrap_err().is_not_found());
    }

    #[test]
    fn missing_rows_are_not_found() {
        let (store, ctx) = store();
        assert!(store.get_relay_by_id(&ctx, RelayId(7)).unwrap_err().is_not_found());
        assert!(store.delete_relay(&ctx, RelayId(7)).unwrap_err().is_not_found());
        assert!(store.delete_tag(&ctx, TagId(7)).unwrap_err().is_not_found());
        assert!(store.get_station(&ctx, "nope").unwrap_err().is_not_found());
        assert!(store.update_user(&ctx, "nope", "x").unwrap_err().is_not_found());
        assert!(store.get_relay_tags(&ctx, RelayId(7)).unwrap_err().is_not_found());
        let update = RelayUpdate {
            alias: "x".into(),
            ..RelayUpdate::default()
        };
        assert_matches!(
            store.update_relay(&ctx, RelayId(7), &update),
            Err(StoreError::NotFound { entity: Entity::Relay, .. })
        );
    }

    #[test]
    fn tag_relay_checks_existence_then_station() {
        let (store, ctx) = store();
        let relay = store.create_relay(&ctx, &new_relay("s1", "ex")).unwrap();
        let local = store.create_tag(&ctx, "news", "s1").unwrap();
        let foreign = store.create_tag(&ctx, "news", "s2").unwrap();

        assert_matches!(
            store.tag_relay(&ctx, RelayId(99), local),
            Err(StoreError::NotFound { entity: Entity::Relay, .. })
        );
        assert_matches!(
            store.tag_relay(&ctx, relay, TagId(99)),
            Err(StoreError::NotFound { entity: Entity::Tag, .. })
        );
        assert_matches!(
            store.tag_relay(&ctx, relay, foreign),
            Err(StoreError::ReferentialIntegrity { entity: Entity::RelayTag, source: None, .. })
        );

        store.tag_relay(&ctx, relay, local).unwrap();
        assert_eq!(store.tag_relay(&ctx, relay, local).unwrap_err().kind(), ErrorKind::Conflict);
        assert_eq!(store.get_relay_tags(&ctx, relay).unwrap().len(), 1);
    }

    #[test]
    fn untag_missing_pair_is_not_found() {
        let (store, ctx) = store();
        let relay = store.create_relay(&ctx, &new_relay("s1", "ex")).unwrap();
        let tag = store.create_tag(&ctx, "news", "s1").unwrap();
        assert_matches!(
            store.untag_relay(&ctx, relay, tag),
            Err(StoreError::NotFound { entity: Entity::RelayTag, .. })
        );
        store.tag_relay(&ctx, relay, tag).unwrap();
        store.untag_relay(&ctx, relay, tag).unwrap();
    }

    #[test]
    fn cancelled_context_leaves_database_unchanged() {
        let (store, ctx) = store();
        let token = CancellationToken::new();
        token.cancel();
        let cancelled = OpContext::with_token(token);

        assert_matches!(
            store.create_relay(&cancelled, &new_relay("s1", "ex")),
            Err(StoreError::Cancelled)
        );
        assert_matches!(store.get_station_relays(&cancelled, "s1"), Err(StoreError::Cancelled));
        assert!(store.get_station_relays(&ctx, "s1").unwrap().is_empty());
    }

    #[test]
    fn expired_deadline_is_cancelled() {
        let (store, _) = store();
        let expired = OpContext::background().with_deadline(Instant::now());
        assert_matches!(store.create_tag(&expired, "news", "s1"), Err(StoreError::Cancelled));

        let generous = OpContext::background().with_timeout(Duration::from_secs(30));
        store.create_tag(&generous, "news", "s1").unwrap();
    }

    #[test]
    fn cancellation_interrupts_running_statement() {
        let (store, _) = store();
        let token = CancellationToken::new();
        let ctx = OpContext::with_token(token.clone());
        let result = store.read(&ctx, |conn| {
            token.cancel();
            conn.query_row(
                "WITH RECURSIVE n(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM n)
                 SELECT count(*) FROM n",
                [],
                |row| row.get::<_, i64>(0),
            )
            .for_entity(Entity::Statement)
        });
        assert_matches!(result, Err(StoreError::Cancelled));

        // The handler is gone once the guard drops.
        let fresh = OpContext::background();
        assert!(store.get_station_relays(&fresh, "s1").unwrap().is_empty());
    }

    #[test]
    fn cancelled_before_commit_rolls_back() {
        let (store, ctx) = store();
        let token = CancellationToken::new();
        let late = OpContext::with_token(token.clone());
        let result = store.write(&late, Entity::Relay, |conn| {
            let id = RelayRepo::create(conn, &new_relay("s1", "ex"))?;
            token.cancel();
            Ok(id)
        });
        assert_matches!(result, Err(StoreError::Cancelled));
        assert!(store.get_relay_by_alias(&ctx, "s1", "ex").unwrap_err().is_not_found());
    }

    #[test]
    fn delete_station_cascades() {
        let (store, ctx) = store();
        let relay = store.create_relay(&ctx, &new_relay("s1", "ex")).unwrap();
        let tag = store.create_tag(&ctx, "news", "s1").unwrap();
        store.tag_relay(&ctx, relay, tag).unwrap();

        store.delete_station(&ctx, "s1").unwrap();
        assert!(store.get_relay_by_id(&ctx, relay).unwrap_err().is_not_found());
        assert!(store.get_station_tags(&ctx, "s1").unwrap().is_empty());
        assert!(store.get_station(&ctx, "s2").is_ok());
    }

    #[test]
    fn station_update_round_trips() {
        let (store, ctx) = store();
        store.update_station(&ctx, "s1", Some("Main"), None).unwrap();
        let station = store.get_station(&ctx, "s1").unwrap();
        assert_eq!(station.title.as_deref(), Some("Main"));
        assert!(station.domain.is_none());
    }

    #[test]
    fn open_file_store_twice_applies_nothing_new() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            path: Some(dir.path().join("kiwi.sqlite")),
            ..StoreConfig::default()
        };
        let ctx = OpContext::background();
        let first = RelayStore::open(&config).unwrap();
        let user = first.create_user(&ctx, "alice", "Alice", "pw").unwrap();
        first.close();

        let second = RelayStore::open(&config).unwrap();
        assert_eq!(second.get_user(&ctx, &user).unwrap().username, "alice");
        assert_eq!(second.statements().len(), crate::Statement::ALL.len());
        second.close();
    }

    #[test]
    fn file_pool_connections_start_warm() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            path: Some(dir.path().join("kiwi.sqlite")),
            connection: ConnectionConfig {
                pool_size: 4,
                ..ConnectionConfig::default()
            },
            ..StoreConfig::default()
        };
        let store = RelayStore::open(&config).unwrap();
        assert_eq!(store.statements().warmed_connections(), 4);

        // Checking out every connection opens nothing new.
        let ctx = OpContext::background();
        let held: Vec<_> = (0..4).map(|_| store.checkout(&ctx).unwrap()).collect();
        assert_eq!(held.len(), 4);
        assert_eq!(store.statements().warmed_connections(), 4);
    }

    #[test]
    fn in_memory_connection_is_warmed_after_migrating() {
        let store = RelayStore::in_memory().unwrap();
        assert_eq!(store.statements().warmed_connections(), 1);
    }

    #[test]
    fn deadline_bounds_lock_wait_only_while_checked_out() {
        let (store, _) = store();
        let short = OpContext::background().with_timeout(Duration::from_millis(500));
        let during = store
            .read(&short, |conn| {
                connection::verify_pragmas(conn).map(|p| p.busy_timeout_ms)
            })
            .unwrap();
        assert!(during <= 500, "busy timeout while checked out: {during}");

        let after = store
            .read(&OpContext::background(), |conn| {
                connection::verify_pragmas(conn).map(|p| p.busy_timeout_ms)
            })
            .unwrap();
        assert_eq!(after, 30_000);
    }
}
