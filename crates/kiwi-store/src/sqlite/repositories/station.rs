//! Station repository — the tenant rows that own relays and tags.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::{Entity, Result, SqliteResultExt};
use crate::sqlite::statements::{Statement, StatementExt};
use crate::types::Station;

/// Station repository — stateless, every method takes `&Connection`.
pub struct StationRepo;

impl StationRepo {
    /// Insert a station owned by `user_id`.
    pub fn create(conn: &Connection, id: &str, user_id: &str) -> Result<Station> {
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn
            .statement(Statement::CreateStation)
            .and_then(|mut stmt| stmt.execute(params![id, user_id, now]))
            .for_entity(Entity::Station)?;
        Ok(Station {
            id: id.to_string(),
            user_id: user_id.to_string(),
            title: None,
            domain: None,
            created_at: now,
        })
    }

    /// Get a station by id.
    pub fn get(conn: &Connection, id: &str) -> Result<Option<Station>> {
        conn.statement(Statement::GetStation)
            .and_then(|mut stmt| stmt.query_row([id], Self::map_row).optional())
            .for_entity(Entity::Station)
    }

    /// Replace title and domain.
    pub fn update(
        conn: &Connection,
        id: &str,
        title: Option<&str>,
        domain: Option<&str>,
    ) -> Result<bool> {
        let changed = conn
            .statement(Statement::UpdateStation)
            .and_then(|mut stmt| stmt.execute(params![title, domain, id]))
            .for_entity(Entity::Station)?;
        Ok(changed > 0)
    }

    /// Delete a station; relays, tags and join rows go with it.
    pub fn delete(conn: &Connection, id: &str) -> Result<bool> {
        let changed = conn
            .statement(Statement::DeleteStation)
            .and_then(|mut stmt| stmt.execute([id]))
            .for_entity(Entity::Station)?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Station> {
        Ok(Station {
            id: row.get(0)?,
            user_id: row.get(1)?,
            title: row.get(2)?,
            domain: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
