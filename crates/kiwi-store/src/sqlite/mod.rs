//! `SQLite` backend for the relay store.
//!
//! # Architecture
//!
//! - **[`connection`]**: `r2d2` connection pool with WAL mode, foreign keys, and
//!   performance pragmas applied to every connection.
//! - **[`migrations`]**: Version-tracked schema evolution, from scripts embedded
//!   at compile time or a directory read at startup. Each step commits with its
//!   bookkeeping row.
//! - **[`statements`]**: The closed set of queries, verified once at startup.
//! - **[`repositories`]**: Stateless repository structs — each method takes
//!   `&Connection` and runs statements from the set. No shared mutable state.

pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod statements;

pub use connection::{
    ConnectionConfig, ConnectionPool, PooledConnection, PragmaState, new_file, new_in_memory,
    verify_pragmas,
};
pub use migrations::{MigrationSource, current_version, latest_version, run_migrations};
pub use statements::{Statement, StatementCache};
