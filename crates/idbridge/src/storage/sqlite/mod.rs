//! SQLite identity backend.
//!
//! Stores users in a single table, one row per user, using `rusqlite` for
//! the synchronous work and `tokio-rusqlite` for async wrapping. The group
//! list lives in one text column as a comma-joined list.

mod backend;
mod conversions;
mod error;
mod schema;

pub use backend::{database_path, SqliteBackend};
