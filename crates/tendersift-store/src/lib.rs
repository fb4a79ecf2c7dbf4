//! TenderSift Store — per-document SQLite FTS5 chunk index and tender records.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::*;
