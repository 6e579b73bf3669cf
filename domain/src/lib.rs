//! Domain layer for Conclave
//!
//! Pure business logic for the staged multi-agent consensus pipeline:
//! stage/phase vocabulary, agent roster matching, quorum policy,
//! payload extraction and deliverable synthesis. No I/O lives here.

pub mod agent;
pub mod consensus;
pub mod core;
pub mod pipeline;
pub mod run;

pub use agent::{AgentOutcome, AgentSpec, OutcomeStatus, Roster};
pub use consensus::extraction::{
    extract_payload, extract_stage_payload, Extraction, ExtractionStatus,
};
pub use consensus::gate::{
    Confidence, GateIssue, GateReview, GateVerdict, IssueMagnitude, Resolvability,
};
pub use consensus::quorum::{QuorumDecision, QuorumPolicy};
pub use consensus::synthesis::{collect_consensus_lists, compose_deliverable};
pub use core::error::DomainError;
pub use pipeline::phase::RunPhase;
pub use pipeline::stage::{ExecutionMode, PipelineStep, QualityGate, Stage};
pub use run::entities::{
    AgentTask, ConsensusArtifact, Run, RunId, RunStatus, SpecId, SynthesisRecord, TaskStatus,
};
