//! Tag repository — station-scoped labels and the `relay_tags` join.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::{Entity, Result, SqliteResultExt};
use crate::sqlite::statements::{Statement, StatementExt};
use crate::types::{RelayId, StationId, Tag, TagId};

/// Tag repository — stateless, every method takes `&Connection`.
pub struct TagRepo;

impl TagRepo {
    /// Insert a tag and return its store-assigned id.
    pub fn create(conn: &Connection, label: &str, station_id: &str) -> Result<TagId> {
        conn.statement(Statement::CreateTag)
            .and_then(|mut stmt| {
                stmt.query_row(params![label, station_id], |row| row.get(0).map(TagId))
            })
            .for_entity(Entity::Tag)
    }

    /// Owning station of a tag.
    pub fn station_of(conn: &Connection, id: TagId) -> Result<Option<StationId>> {
        conn.statement(Statement::GetTagStation)
            .and_then(|mut stmt| stmt.query_row([id.0], |row| row.get(0)).optional())
            .for_entity(Entity::Tag)
    }

    /// Delete the tag's join rows, then the tag.
    pub fn delete(conn: &Connection, id: TagId) -> Result<bool> {
        let _ = conn
            .statement(Statement::DeleteTagRelays)
            .and_then(|mut stmt| stmt.execute([id.0]))
            .for_entity(Entity::RelayTag)?;
        let changed = conn
            .statement(Statement::DeleteTag)
            .and_then(|mut stmt| stmt.execute([id.0]))
            .for_entity(Entity::Tag)?;
        Ok(changed > 0)
    }

    /// Tags of a station, ordered by label.
    pub fn list_by_station(conn: &Connection, station_id: &str) -> Result<Vec<Tag>> {
        conn.statement(Statement::GetStationTags)
            .and_then(|mut stmt| {
                stmt.query_map([station_id], Self::map_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .for_entity(Entity::Tag)
    }

    /// Tags attached to a relay, ordered by label.
    pub fn list_by_relay(conn: &Connection, relay_id: RelayId) -> Result<Vec<Tag>> {
        conn.statement(Statement::GetRelayTags)
            .and_then(|mut stmt| {
                stmt.query_map([relay_id.0], Self::map_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .for_entity(Entity::Tag)
    }

    /// Attach a tag to a relay. Both must belong to `station_id`; the
    /// schema's composite foreign keys reject anything else.
    pub fn attach(
        conn: &Connection,
        relay_id: RelayId,
        tag_id: TagId,
        station_id: &str,
    ) -> Result<()> {
        let _ = conn
            .statement(Statement::TagRelay)
            .and_then(|mut stmt| stmt.execute(params![relay_id.0, tag_id.0, station_id]))
            .for_entity(Entity::RelayTag)?;
        Ok(())
    }

    /// Detach a tag from a relay. Returns `false` if the pair was not attached.
    pub fn detach(conn: &Connection, relay_id: RelayId, tag_id: TagId) -> Result<bool> {
        let changed = conn
            .statement(Statement::UntagRelay)
            .and_then(|mut stmt| stmt.execute([relay_id.0, tag_id.0]))
            .for_entity(Entity::RelayTag)?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
        Ok(Tag {
            id: TagId(row.get(0)?),
            label: row.get(1)?,
            station_id: row.get(2)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
