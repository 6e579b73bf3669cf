//! Core entities persisted by the store
//!
//! The store is the source of truth for all of these; nothing in memory
//! outlives the current stage's in-flight execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::consensus::extraction::ExtractionStatus;
use crate::consensus::gate::GateVerdict;
use crate::pipeline::phase::RunPhase;
use crate::pipeline::stage::PipelineStep;

/// Opaque, globally unique run identifier
///
/// Format: `<spec_id>_<unix_secs>_<uuid8>`, so logs and evidence files
/// sort and correlate without a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log tagging
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        RunId(s)
    }
}

/// Identifier of the specification a run executes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecId(pub String);

impl SpecId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SpecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SpecId {
    fn from(s: &str) -> Self {
        SpecId(s.to_string())
    }
}

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(RunStatus::InProgress),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// One execution of the full pipeline for a specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub spec_id: SpecId,
    pub phase: RunPhase,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of one agent's assignment within a run+stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    TimedOut,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::TimedOut => "timed_out",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::TimedOut | TaskStatus::Failed
        )
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "timed_out" => Ok(TaskStatus::TimedOut),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// One agent's assignment within a run+stage
///
/// Immutable once terminal except for the completion timestamp written
/// together with the status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: i64,
    pub run_id: RunId,
    pub step: PipelineStep,
    pub agent_id: String,
    pub status: TaskStatus,
    pub spawned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub raw_output: Option<String>,
}

/// Structured candidate extracted from one agent's raw output
///
/// At most one artifact exists per (run, step, agent); a later
/// extraction for the same triple replaces the earlier one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusArtifact {
    pub run_id: RunId,
    pub step: PipelineStep,
    pub agent_id: String,
    pub payload: Value,
    pub extraction_status: ExtractionStatus,
}

impl ConsensusArtifact {
    /// Whether this artifact counts toward quorum content
    pub fn is_usable(&self) -> bool {
        self.extraction_status.is_usable()
    }
}

/// Per-step consensus result
///
/// Append-only in the store: a later synthesis for the same run+step
/// supersedes, never silently returns, the prior one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisRecord {
    pub run_id: RunId,
    pub step: PipelineStep,
    pub artifact_count: usize,
    pub quorum_required: usize,
    pub degraded: bool,
    /// Present only for quality-gate synthesis
    pub verdict: Option<GateVerdict>,
    pub deliverable: String,
    pub agreements: Vec<String>,
    pub conflicts: Vec<String>,
    pub missing_agents: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_short_prefix() {
        let id = RunId("SPEC-001_1700000000_ab12cd34".to_string());
        assert_eq!(id.short(), "SPEC-001");
    }

    #[test]
    fn test_task_status_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::TimedOut,
            TaskStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<TaskStatus>().ok(), Some(status));
        }
    }

    #[test]
    fn test_failed_extraction_artifact_is_not_usable() {
        let artifact = ConsensusArtifact {
            run_id: RunId("r".into()),
            step: PipelineStep::Stage(crate::pipeline::stage::Stage::Plan),
            agent_id: "claude".into(),
            payload: Value::Null,
            extraction_status: ExtractionStatus::Failed,
        };
        assert!(!artifact.is_usable());
    }
}
