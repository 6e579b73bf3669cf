//! Agent transport adapters

pub mod command;

pub use command::CommandTransport;
