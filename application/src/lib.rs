//! Application layer for conclave
//!
//! This crate contains use cases, port definitions, and application
//! configuration. It depends only on the domain layer.

pub mod config;
pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use config::{ExecutionParams, PipelinePlan};
pub use ports::{
    agent_transport::{AgentPrompt, AgentTransport, TransportError},
    context_source::{ContextError, ContextSource, NoContext},
    evidence_sink::{EvidenceError, EvidenceSink, NoEvidence},
    progress::{NoProgress, ProgressNotifier},
    run_store::{RunStore, StoreError},
};
pub use use_cases::{
    AgentCoordinator, ExportUseCase, GateError, PipelineError, QualityGateUseCase,
    RunPipelineUseCase, RunStatusView, RunStepError, StatusUseCase, StepRequest,
    SynthesizeUseCase,
};
