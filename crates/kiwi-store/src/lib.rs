//! # kiwi-store
//!
//! `SQLite` persistence and alias resolution for the Relay Kiwi redirect
//! service.
//!
//! - **Data model**: users own stations; stations own relays (alias →
//!   destination) and tags; relays and tags of one station are joined many
//!   to many
//! - **Migrator**: version-tracked schema steps, embedded or read from a
//!   directory, each committed with its bookkeeping row
//! - **Statement cache**: the closed set of queries, compiled and checked
//!   against the live schema at startup
//! - **Relay store**: transactional operations taking an [`OpContext`] for
//!   cancellation and deadlines
//! - **Resolver**: the request-path reads (alias → destination, tag →
//!   relays)

#![deny(unsafe_code)]

pub mod context;
pub mod errors;
pub mod passphrase;
pub mod resolver;
pub mod sqlite;
pub mod store;
pub mod types;

pub use context::OpContext;
pub use errors::{Entity, ErrorKind, MigrationError, Result, StoreError};
pub use resolver::Resolver;
pub use sqlite::{ConnectionConfig, MigrationSource, Statement, StatementCache};
pub use store::{RelayStore, StoreConfig};
pub use types::{
    NewRelay, Relay, RelayId, RelayUpdate, Station, StationId, Tag, TagId, User, UserId,
};
