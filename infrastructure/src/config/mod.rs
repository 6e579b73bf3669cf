//! Configuration schema and loading

pub mod file_config;
pub mod loader;

pub use file_config::{AgentConfig, ConfigError, ExecutionConfig, FileConfig, TransportConfig};
pub use loader::ConfigLoader;
