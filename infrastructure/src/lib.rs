//! Infrastructure layer for conclave
//!
//! Concrete adapters behind the application ports: the SQLite run
//! store, filesystem evidence tree, subprocess agent transport,
//! playbook context source and configuration loading.

pub mod config;
pub mod context;
pub mod evidence;
pub mod store;
pub mod transport;

pub use config::{ConfigError, ConfigLoader, FileConfig};
pub use context::PlaybookContextSource;
pub use evidence::FileEvidenceSink;
pub use store::{BackoffPolicy, SqliteRunStore};
pub use transport::CommandTransport;
