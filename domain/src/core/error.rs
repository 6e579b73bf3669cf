//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Empty roster for stage {0}")]
    EmptyRoster(String),

    #[error("Stage {stage} did not reach quorum: {usable} of {required} required artifacts")]
    QuorumNotMet {
        stage: String,
        usable: usize,
        required: usize,
    },

    #[error("Invalid stage name: {0}")]
    InvalidStage(String),

    #[error("Invalid run phase: {0}")]
    InvalidPhase(String),

    #[error("Gate review for agent {agent} is not valid structured output: {reason}")]
    MalformedGateReview { agent: String, reason: String },

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }
}
