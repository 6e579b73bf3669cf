//! Prompt context adapters

pub mod playbook;

pub use playbook::PlaybookContextSource;
