//! High-level `RelayStore` API.
//!
//! The [`RelayStore`] composes the repositories into operations that take an
//! [`OpContext`](crate::OpContext). Multi-statement writes execute within a
//! single `SQLite` transaction, so callers never see partial state.

mod relay_store;

pub use relay_store::*;
