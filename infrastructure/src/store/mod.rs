//! Persistent run store backed by SQLite

pub mod migrations;
pub mod retry;
pub mod sqlite;

pub use retry::BackoffPolicy;
pub use sqlite::SqliteRunStore;
