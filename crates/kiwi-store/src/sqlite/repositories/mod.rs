//! Repository implementations for `SQLite` database operations.
//!
//! Each repository is a stateless struct whose methods take a `&Connection`
//! and run one or more [`Statement`](crate::sqlite::statements::Statement)s.
//! Lookups return `Option` and mutations report whether a row changed; the
//! store turns those into `NotFound` for its callers. Multi-statement
//! mutations expect the caller to hold a transaction.

pub mod relay;
pub mod station;
pub mod tag;
pub mod user;

pub use relay::RelayRepo;
pub use station::StationRepo;
pub use tag::TagRepo;
pub use user::UserRepo;
