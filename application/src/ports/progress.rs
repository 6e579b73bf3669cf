//! Progress notification port
//!
//! Callbacks the use cases emit while a run executes. Rendering is an
//! adapter concern; all methods default to no-ops so observers implement
//! only what they care about.

use conclave_domain::{OutcomeStatus, PipelineStep, QualityGate, RunPhase};

/// Observer of pipeline progress
pub trait ProgressNotifier: Send + Sync {
    /// A step's fan-out is starting
    fn on_step_start(&self, _step: PipelineStep, _agent_count: usize) {}

    /// One agent reached a terminal state
    fn on_agent_complete(&self, _step: PipelineStep, _agent_id: &str, _status: OutcomeStatus) {}

    /// A synthesis record was persisted
    fn on_synthesis(&self, _step: PipelineStep, _degraded: bool) {}

    /// A quality gate produced a verdict
    fn on_gate_verdict(&self, _gate: QualityGate, _passed: bool) {}

    /// The run's persisted phase changed
    fn on_phase_advance(&self, _phase: &RunPhase) {}
}

/// No-op notifier for headless execution and tests
pub struct NoProgress;

impl ProgressNotifier for NoProgress {}
