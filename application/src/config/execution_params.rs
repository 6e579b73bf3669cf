//! Execution parameters for the pipeline use cases
//!
//! These group the static knobs that control fan-out scheduling, quorum
//! policy and retry budgets. They are application-layer concerns, not
//! domain policy.

use conclave_domain::{ExecutionMode, QuorumPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Static parameters controlling step execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionParams {
    /// Barrier timeout for one step's fan-out. In parallel mode the
    /// whole roster shares it; in sequential mode each agent gets it.
    pub step_timeout: Duration,
    /// Default scheduling mode for stages without an override
    pub mode: ExecutionMode,
    /// Quorum policy applied at synthesis
    pub quorum: QuorumPolicy,
    /// Additional attempts for a quality gate that fails or cannot
    /// reach quorum
    pub gate_max_retries: usize,
    /// Additional attempts for a stage that fails to reach quorum
    pub stage_max_retries: usize,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(300),
            mode: ExecutionMode::Parallel,
            quorum: QuorumPolicy::default(),
            gate_max_retries: 1,
            stage_max_retries: 0,
        }
    }
}

impl ExecutionParams {
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_quorum(mut self, quorum: QuorumPolicy) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn with_gate_max_retries(mut self, retries: usize) -> Self {
        self.gate_max_retries = retries;
        self
    }

    pub fn with_stage_max_retries(mut self, retries: usize) -> Self {
        self.stage_max_retries = retries;
        self
    }
}
