//! Error types for the relay store.
//!
//! [`StoreError`] is the single error type returned by every store
//! operation. Low-level `SQLite` and pool failures are classified into a
//! small taxonomy ([`ErrorKind`]) while keeping the originating error
//! reachable through [`std::error::Error::source`].
//!
//! [`MigrationError`] is returned by the schema migrator and is fatal at
//! startup.

use std::fmt;

use rusqlite::ffi;
use thiserror::Error;

/// Boxed error used as the root cause of [`StoreError::Unavailable`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Entity an error refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    /// A user account.
    User,
    /// A station (tenant).
    Station,
    /// A relay (alias → destination).
    Relay,
    /// A station-scoped tag.
    Tag,
    /// A relay/tag association.
    RelayTag,
    /// A prepared statement.
    Statement,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "user",
            Self::Station => "station",
            Self::Relay => "relay",
            Self::Tag => "tag",
            Self::RelayTag => "relay tag",
            Self::Statement => "statement",
        };
        f.write_str(name)
    }
}

/// Flat classification of a [`StoreError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Referenced entity absent.
    NotFound,
    /// Uniqueness violation.
    Conflict,
    /// Foreign entity absent or owned by another station.
    ReferentialIntegrity,
    /// Storage unreachable, busy, or not migrated.
    Unavailable,
    /// Malformed input rejected before or by the schema.
    Validation,
    /// The caller cancelled the operation or its deadline passed.
    Cancelled,
}

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced entity does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of entity that was looked up.
        entity: Entity,
        /// Identifier used for the lookup.
        key: String,
    },

    /// A uniqueness constraint rejected the write.
    #[error("{entity} already exists: {source}")]
    Conflict {
        /// Kind of entity that collided.
        entity: Entity,
        /// Constraint failure reported by `SQLite`.
        source: rusqlite::Error,
    },

    /// A referenced entity is missing or belongs to a different station.
    #[error("referential integrity violation on {entity}: {detail}")]
    ReferentialIntegrity {
        /// Kind of entity being written.
        entity: Entity,
        /// What was violated.
        detail: String,
        /// Foreign key failure, when the schema caught it.
        source: Option<rusqlite::Error>,
    },

    /// The underlying storage could not complete the call.
    #[error("storage unavailable ({context}): {source}")]
    Unavailable {
        /// What the store was doing.
        context: String,
        /// Root cause.
        source: BoxError,
    },

    /// Schema migration failed.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// Malformed input.
    #[error("invalid input: {message}")]
    Validation {
        /// Describes the rejected value.
        message: String,
        /// Check constraint failure, when the schema caught it.
        source: Option<rusqlite::Error>,
    },

    /// The caller's context was cancelled or its deadline passed.
    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::ReferentialIntegrity { .. } => ErrorKind::ReferentialIntegrity,
            Self::Unavailable { .. } | Self::Migration(_) => ErrorKind::Unavailable,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether this is a [`ErrorKind::NotFound`] error.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn not_found(entity: Entity, key: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn referential(entity: Entity, detail: impl Into<String>) -> Self {
        Self::ReferentialIntegrity {
            entity,
            detail: detail.into(),
            source: None,
        }
    }

    pub(crate) fn unavailable(
        context: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Unavailable {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Classify a `SQLite` error raised while operating on `entity`.
    pub(crate) fn from_sqlite(entity: Entity, err: rusqlite::Error) -> Self {
        let rusqlite::Error::SqliteFailure(failure, _) = &err else {
            return Self::unavailable(format!("{entity} query"), err);
        };
        if failure.code == rusqlite::ErrorCode::OperationInterrupted {
            return Self::Cancelled;
        }
        let extended_code = failure.extended_code;
        match extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => Self::Conflict {
                entity,
                source: err,
            },
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY => Self::ReferentialIntegrity {
                entity,
                detail: "foreign key constraint failed".into(),
                source: Some(err),
            },
            ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => Self::Validation {
                message: format!("{entity} rejected by schema check"),
                source: Some(err),
            },
            _ => Self::unavailable(format!("{entity} query"), err),
        }
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        Self::unavailable("connection pool checkout", err)
    }
}

/// Whether `err` is `SQLite` giving up on a lock held by another connection.
pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::DatabaseBusy
    )
}

/// Attach an [`Entity`] to a raw `SQLite` result and classify its error.
pub(crate) trait SqliteResultExt<T> {
    fn for_entity(self, entity: Entity) -> Result<T>;
}

impl<T> SqliteResultExt<T> for rusqlite::Result<T> {
    fn for_entity(self, entity: Entity) -> Result<T> {
        self.map_err(|e| StoreError::from_sqlite(entity, e))
    }
}

/// Errors raised while bringing the schema up to date.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The database file could not be opened or configured.
    #[error("failed to open database {path}: {source}")]
    Open {
        /// Database path.
        path: String,
        /// Underlying failure.
        source: rusqlite::Error,
    },

    /// Reading or writing the `schema_version` table failed.
    #[error("schema_version bookkeeping failed: {source}")]
    Bookkeeping {
        /// Underlying failure.
        source: rusqlite::Error,
    },

    /// A migration directory could not be read.
    #[error("failed to read migration source {path}: {source}")]
    Source {
        /// Directory or file that failed.
        path: String,
        /// Underlying failure.
        source: std::io::Error,
    },

    /// Two scripts in a migration directory share a version number.
    #[error("duplicate migration version {version} in {path}")]
    DuplicateVersion {
        /// Repeated version.
        version: u32,
        /// Directory containing both scripts.
        path: String,
    },

    /// A migration step failed and was rolled back.
    #[error("migration v{version} ({description}) failed: {source}")]
    Step {
        /// Version of the failing step.
        version: u32,
        /// Step description.
        description: String,
        /// Underlying failure.
        source: rusqlite::Error,
    },

    /// The database records a version newer than any known step.
    #[error("database schema is at v{found}, newer than the latest known migration v{latest}")]
    UnknownVersion {
        /// Highest version recorded in the database.
        found: u32,
        /// Highest version this build knows about.
        latest: u32,
    },
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
