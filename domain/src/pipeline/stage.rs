//! Pipeline stage definitions
//!
//! Stages form a closed, strictly ordered vocabulary. Each stage has one
//! synthesis strategy; quality gates are a separate closed set that runs
//! between stages and produces a pass/fail verdict instead of a plain
//! deliverable.

use serde::{Deserialize, Serialize};

use crate::core::error::DomainError;

/// One ordered phase of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Plan,
    Tasks,
    Implement,
    Validate,
    Audit,
    Unlock,
}

impl Stage {
    /// All pipeline stages in execution order
    pub fn all() -> [Stage; 6] {
        [
            Stage::Plan,
            Stage::Tasks,
            Stage::Implement,
            Stage::Validate,
            Stage::Audit,
            Stage::Unlock,
        ]
    }

    /// Stable lowercase name used for storage and filenames
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Plan => "plan",
            Stage::Tasks => "tasks",
            Stage::Implement => "implement",
            Stage::Validate => "validate",
            Stage::Audit => "audit",
            Stage::Unlock => "unlock",
        }
    }

    /// Human-readable display name
    pub fn display_name(self) -> &'static str {
        match self {
            Stage::Plan => "Plan",
            Stage::Tasks => "Tasks",
            Stage::Implement => "Implement",
            Stage::Validate => "Validate",
            Stage::Audit => "Audit",
            Stage::Unlock => "Unlock",
        }
    }

    /// The stage that follows this one, if any
    pub fn next(self) -> Option<Stage> {
        let all = Stage::all();
        let idx = all.iter().position(|s| *s == self)?;
        all.get(idx + 1).copied()
    }

    /// Zero-based position in the pipeline
    pub fn ordinal(self) -> usize {
        Stage::all().iter().position(|s| *s == self).unwrap_or(0)
    }

    /// Payload field this stage's artifacts are expected to carry
    pub fn required_field(self) -> &'static str {
        match self {
            Stage::Plan => "work_breakdown",
            Stage::Tasks => "tasks",
            Stage::Implement => "implementation",
            Stage::Validate => "test_strategy",
            Stage::Audit => "audit_verdict",
            Stage::Unlock => "unlock_decision",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = DomainError;

    /// Parse from storage names and common command aliases
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plan" | "spec-plan" => Ok(Stage::Plan),
            "tasks" | "spec-tasks" => Ok(Stage::Tasks),
            "implement" | "spec-implement" => Ok(Stage::Implement),
            "validate" | "spec-validate" => Ok(Stage::Validate),
            "audit" | "review" | "spec-audit" => Ok(Stage::Audit),
            "unlock" | "spec-unlock" => Ok(Stage::Unlock),
            other => Err(DomainError::InvalidStage(other.to_string())),
        }
    }
}

/// Quality gates run between user-visible stages
///
/// A gate consumes the same fan-out machinery as a stage but enforces a
/// strict structured-output contract and yields a pass/fail verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityGate {
    Clarify,
    Analyze,
    Checklist,
}

impl QualityGate {
    /// All quality gates
    pub fn all() -> [QualityGate; 3] {
        [
            QualityGate::Clarify,
            QualityGate::Analyze,
            QualityGate::Checklist,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityGate::Clarify => "clarify",
            QualityGate::Analyze => "analyze",
            QualityGate::Checklist => "checklist",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            QualityGate::Clarify => "Clarify",
            QualityGate::Analyze => "Analyze",
            QualityGate::Checklist => "Checklist",
        }
    }
}

impl std::fmt::Display for QualityGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for QualityGate {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clarify" | "spec-clarify" => Ok(QualityGate::Clarify),
            "analyze" | "spec-analyze" => Ok(QualityGate::Analyze),
            "checklist" | "spec-checklist" => Ok(QualityGate::Checklist),
            other => Err(DomainError::InvalidStage(other.to_string())),
        }
    }
}

/// A step the coordinator can execute: a pipeline stage or a quality gate
///
/// Tasks, artifacts and synthesis records are keyed by step so that gate
/// executions are persisted through the same tables as stage executions.
/// Stage and gate names never collide, so the storage name stays flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PipelineStep {
    Stage(Stage),
    Gate(QualityGate),
}

impl PipelineStep {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStep::Stage(s) => s.as_str(),
            PipelineStep::Gate(g) => g.as_str(),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            PipelineStep::Stage(s) => s.display_name(),
            PipelineStep::Gate(g) => g.display_name(),
        }
    }

    pub fn is_gate(self) -> bool {
        matches!(self, PipelineStep::Gate(_))
    }

    pub fn stage(self) -> Option<Stage> {
        match self {
            PipelineStep::Stage(s) => Some(s),
            PipelineStep::Gate(_) => None,
        }
    }
}

impl From<Stage> for PipelineStep {
    fn from(stage: Stage) -> Self {
        PipelineStep::Stage(stage)
    }
}

impl From<QualityGate> for PipelineStep {
    fn from(gate: QualityGate) -> Self {
        PipelineStep::Gate(gate)
    }
}

impl std::fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PipelineStep {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(stage) = s.parse::<Stage>() {
            return Ok(PipelineStep::Stage(stage));
        }
        s.parse::<QualityGate>().map(PipelineStep::Gate)
    }
}

/// How a stage's roster is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Agents run one at a time; each result is persisted as it lands
    Sequential,
    /// All agents launch concurrently behind a shared timeout barrier
    #[default]
    Parallel,
}
