//! Pipeline vocabulary: stages, quality gates and run phases

pub mod phase;
pub mod stage;

pub use phase::RunPhase;
pub use stage::{ExecutionMode, PipelineStep, QualityGate, Stage};
