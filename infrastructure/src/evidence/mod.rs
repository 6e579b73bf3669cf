//! Evidence export adapters

pub mod file_sink;

pub use file_sink::FileEvidenceSink;
