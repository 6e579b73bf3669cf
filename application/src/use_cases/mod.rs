//! Application use cases

pub mod export;
pub mod quality_gate;
pub mod run_pipeline;
pub mod run_step;
pub mod status;
pub mod synthesize;

#[cfg(test)]
pub mod testing;

pub use export::{ExportError, ExportUseCase};
pub use quality_gate::{GateError, GatePassed, QualityGateUseCase};
pub use run_pipeline::{PipelineError, RunPipelineUseCase};
pub use run_step::{AgentCoordinator, RunStepError, StepExecution, StepRequest};
pub use status::{RunStatusView, StageStatus, StatusError, StatusUseCase};
pub use synthesize::{SynthesisInput, SynthesizeError, SynthesizeUseCase};
