//! Pipeline plan: which roster runs which steps, and where gates sit
//!
//! A plan is immutable for the lifetime of a run. Stage order itself is
//! fixed by the domain; the plan only decides participation.

use std::collections::BTreeMap;

use conclave_domain::{ExecutionMode, QualityGate, Roster, Stage};
use serde::{Deserialize, Serialize};

/// Participation plan for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelinePlan {
    /// Roster shared by all stages
    pub roster: Roster,
    /// Gates that must pass before a stage may fan out
    pub gates_before: BTreeMap<Stage, Vec<QualityGate>>,
    /// Per-stage scheduling overrides
    pub mode_overrides: BTreeMap<Stage, ExecutionMode>,
}

impl PipelinePlan {
    pub fn new(roster: Roster) -> Self {
        Self {
            roster,
            gates_before: BTreeMap::new(),
            mode_overrides: BTreeMap::new(),
        }
    }

    pub fn with_gate(mut self, stage: Stage, gate: QualityGate) -> Self {
        self.gates_before.entry(stage).or_default().push(gate);
        self
    }

    pub fn with_mode_override(mut self, stage: Stage, mode: ExecutionMode) -> Self {
        self.mode_overrides.insert(stage, mode);
        self
    }

    /// Gates configured ahead of a stage
    pub fn gates_before(&self, stage: Stage) -> &[QualityGate] {
        self.gates_before
            .get(&stage)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Scheduling mode for a stage, falling back to the given default
    pub fn mode_for(&self, stage: Stage, default: ExecutionMode) -> ExecutionMode {
        self.mode_overrides.get(&stage).copied().unwrap_or(default)
    }
}
