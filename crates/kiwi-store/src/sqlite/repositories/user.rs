//! User repository: accounts and their passphrase hashes.

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::errors::{Entity, Result, SqliteResultExt};
use crate::sqlite::statements::{Statement, StatementExt};
use crate::types::User;

/// User repository — stateless, every method takes `&Connection`.
pub struct UserRepo;

impl UserRepo {
    /// Insert a user with a store-assigned UUID v7 id.
    ///
    /// `passphrase_hash` must already be hashed.
    pub fn create(
        conn: &Connection,
        username: &str,
        display_name: &str,
        passphrase_hash: &str,
    ) -> Result<User> {
        let id = Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let _ = conn
            .statement(Statement::CreateUser)
            .and_then(|mut stmt| {
                stmt.execute(params![id, username, display_name, passphrase_hash, now])
            })
            .for_entity(Entity::User)?;
        Ok(User {
            id,
            username: username.to_string(),
            display_name: display_name.to_string(),
            created_at: now,
        })
    }

    /// Get a user whose id or username equals `key`.
    pub fn get(conn: &Connection, key: &str) -> Result<Option<User>> {
        conn.statement(Statement::GetUser)
            .and_then(|mut stmt| stmt.query_row([key], Self::map_row).optional())
            .for_entity(Entity::User)
    }

    /// Stored passphrase hash for `username`.
    pub fn passphrase_hash(conn: &Connection, username: &str) -> Result<Option<String>> {
        conn.statement(Statement::GetUserPassphrase)
            .and_then(|mut stmt| stmt.query_row([username], |row| row.get(0)).optional())
            .for_entity(Entity::User)
    }

    /// Change the display name. Returns `false` if the user does not exist.
    pub fn update_display_name(conn: &Connection, id: &str, display_name: &str) -> Result<bool> {
        let changed = conn
            .statement(Statement::UpdateUser)
            .and_then(|mut stmt| stmt.execute(params![display_name, id]))
            .for_entity(Entity::User)?;
        Ok(changed > 0)
    }

    /// Delete a user and, through the schema, everything they own.
    pub fn delete(conn: &Connection, id: &str) -> Result<bool> {
        let changed = conn
            .statement(Statement::DeleteUser)
            .and_then(|mut stmt| stmt.execute([id]))
            .for_entity(Entity::User)?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            display_name: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
