//! Relay repository — alias to destination mappings.
//!
//! Every listing is scoped by station. A relay's join rows are removed
//! alongside it by [`RelayRepo::delete`], which runs two statements and so
//! expects the caller to hold a transaction.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::{Entity, Result, SqliteResultExt};
use crate::sqlite::statements::{Statement, StatementExt};
use crate::types::{NewRelay, Relay, RelayId, RelayUpdate, StationId};

/// Relay repository — stateless, every method takes `&Connection`.
pub struct RelayRepo;

impl RelayRepo {
    /// Insert a relay and return its store-assigned id.
    pub fn create(conn: &Connection, relay: &NewRelay) -> Result<RelayId> {
        let now = chrono::Utc::now().to_rfc3339();
        conn.statement(Statement::CreateRelay)
            .and_then(|mut stmt| {
                stmt.query_row(
                    params![
                        relay.title,
                        relay.alias,
                        relay.destination,
                        relay.note,
                        relay.station_id,
                        now,
                    ],
                    |row| row.get(0).map(RelayId),
                )
            })
            .for_entity(Entity::Relay)
    }

    /// Replace title, alias, destination and note. Returns `false` if the
    /// relay does not exist.
    pub fn update(conn: &Connection, id: RelayId, update: &RelayUpdate) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let changed = conn
            .statement(Statement::UpdateRelay)
            .and_then(|mut stmt| {
                stmt.execute(params![
                    update.title,
                    update.alias,
                    update.destination,
                    update.note,
                    now,
                    id.0,
                ])
            })
            .for_entity(Entity::Relay)?;
        Ok(changed > 0)
    }

    /// Delete the relay's join rows, then the relay.
    pub fn delete(conn: &Connection, id: RelayId) -> Result<bool> {
        let _ = conn
            .statement(Statement::DeleteRelayTags)
            .and_then(|mut stmt| stmt.execute([id.0]))
            .for_entity(Entity::RelayTag)?;
        let changed = conn
            .statement(Statement::DeleteRelay)
            .and_then(|mut stmt| stmt.execute([id.0]))
            .for_entity(Entity::Relay)?;
        Ok(changed > 0)
    }

    /// Owning station of a relay.
    pub fn station_of(conn: &Connection, id: RelayId) -> Result<Option<StationId>> {
        conn.statement(Statement::GetRelayStation)
            .and_then(|mut stmt| stmt.query_row([id.0], |row| row.get(0)).optional())
            .for_entity(Entity::Relay)
    }

    /// Get a relay by id.
    pub fn get_by_id(conn: &Connection, id: RelayId) -> Result<Option<Relay>> {
        conn.statement(Statement::GetRelayById)
            .and_then(|mut stmt| stmt.query_row([id.0], Self::map_row).optional())
            .for_entity(Entity::Relay)
    }

    /// Get a relay by exact (case-sensitive) alias within a station.
    pub fn get_by_alias(conn: &Connection, station_id: &str, alias: &str) -> Result<Option<Relay>> {
        conn.statement(Statement::GetRelayByAlias)
            .and_then(|mut stmt| {
                stmt.query_row(params![station_id, alias], Self::map_row)
                    .optional()
            })
            .for_entity(Entity::Relay)
    }

    /// All relays of a station, ordered by id.
    pub fn list_by_station(conn: &Connection, station_id: &str) -> Result<Vec<Relay>> {
        conn.statement(Statement::GetStationRelays)
            .and_then(|mut stmt| {
                stmt.query_map([station_id], Self::map_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .for_entity(Entity::Relay)
    }

    /// Relays of a station carrying the tag `label`, ordered by id.
    pub fn list_by_tag(conn: &Connection, label: &str, station_id: &str) -> Result<Vec<Relay>> {
        conn.statement(Statement::GetRelaysByTag)
            .and_then(|mut stmt| {
                stmt.query_map(params![label, station_id], Self::map_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .for_entity(Entity::Relay)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Relay> {
        Ok(Relay {
            id: RelayId(row.get(0)?),
            title: row.get(1)?,
            alias: row.get(2)?,
            destination: row.get(3)?,
            note: row.get(4)?,
            station_id: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
