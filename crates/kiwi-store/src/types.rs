//! Public data model: identifiers and the rows the store hands out.
//!
//! Numeric identifiers are store-assigned and parse strictly from text, so
//! a malformed path segment is rejected instead of defaulting to some id.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = StoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.parse::<i64>() {
                    Ok(n) if n > 0 => Ok(Self(n)),
                    _ => Err(StoreError::validation(format!(
                        "malformed {} id: {:?}",
                        $label, s
                    ))),
                }
            }
        }
    };
}

numeric_id!(
    /// Store-assigned relay identifier (`SQLite` `INTEGER PRIMARY KEY`).
    RelayId,
    "relay"
);

numeric_id!(
    /// Store-assigned tag identifier.
    TagId,
    "tag"
);

/// User identifier (UUID v7 text, assigned by the store).
pub type UserId = String;

/// Station identifier (chosen by the caller).
pub type StationId = String;

/// A user account. The passphrase hash never leaves the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
}

/// A tenant that owns relays and tags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Station {
    /// Station ID.
    pub id: StationId,
    /// Owning user.
    pub user_id: UserId,
    /// Optional display title.
    pub title: Option<String>,
    /// Optional domain the station serves.
    pub domain: Option<String>,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
}

/// An alias mapped to a destination URL within a station.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relay {
    /// Relay ID.
    pub id: RelayId,
    /// Human-readable title.
    pub title: String,
    /// Short code, unique within the station.
    pub alias: String,
    /// Target URL.
    pub destination: String,
    /// Free-text note.
    pub note: String,
    /// Owning station.
    pub station_id: StationId,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last update timestamp (RFC 3339).
    pub updated_at: String,
}

/// A station-scoped label.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    /// Tag ID.
    pub id: TagId,
    /// Label, unique within the station.
    pub label: String,
    /// Owning station.
    pub station_id: StationId,
}

/// Input for [`RelayStore::create_relay`](crate::RelayStore::create_relay).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRelay {
    /// Title.
    pub title: String,
    /// Alias.
    pub alias: String,
    /// Destination URL, validated by the caller.
    pub destination: String,
    /// Note.
    pub note: String,
    /// Owning station.
    pub station_id: StationId,
}

/// Replacement values for [`RelayStore::update_relay`](crate::RelayStore::update_relay).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayUpdate {
    /// New title.
    pub title: String,
    /// New alias.
    pub alias: String,
    /// New destination URL.
    pub destination: String,
    /// New note.
    pub note: String,
}
