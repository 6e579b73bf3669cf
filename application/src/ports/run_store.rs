//! Persistent store port
//!
//! The store is the single shared mutable resource in the system and the
//! authoritative copy of all run state. The trait is synchronous: every
//! method is one logical transaction, and adapters are expected to wrap
//! writes in bounded retry around transient contention.
//!
//! Because the trait is synchronous, a method call may block its thread
//! for the duration of the transaction plus any retry backoff. Adapters
//! must keep that window short (local storage, sub-second backoff caps);
//! callers on an async runtime invoke these methods inline on that
//! understanding.

use conclave_domain::{
    AgentTask, ConsensusArtifact, PipelineStep, Run, RunId, RunPhase, RunStatus, SpecId,
    SynthesisRecord, TaskStatus,
};
use thiserror::Error;

/// Errors surfaced by store adapters
#[derive(Error, Debug)]
pub enum StoreError {
    /// Transient lock contention; safe to retry
    #[error("Store busy: {0}")]
    Busy(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Storage failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether a retry with backoff may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Busy(_))
    }
}

/// Transactional storage of runs, tasks, artifacts and synthesis records
///
/// Writes touching shared run state execute inside a single transaction
/// per method call. Synthesis storage is append-only: `store_synthesis`
/// always inserts a new row, and the current record for a (run, step) is
/// the one with the latest creation timestamp.
pub trait RunStore: Send + Sync {
    /// Persist a new run record
    fn create_run(&self, run: &Run) -> Result<(), StoreError>;

    fn load_run(&self, run_id: &RunId) -> Result<Run, StoreError>;

    /// Most recently created run for a specification, if any
    fn latest_run_for_spec(&self, spec_id: &SpecId) -> Result<Option<Run>, StoreError>;

    fn list_runs(&self, spec_id: &SpecId) -> Result<Vec<Run>, StoreError>;

    /// Persist a phase transition; must land before any agent for the
    /// next stage is spawned
    fn advance_phase(&self, run_id: &RunId, phase: RunPhase) -> Result<(), StoreError>;

    fn finish_run(&self, run_id: &RunId, status: RunStatus) -> Result<(), StoreError>;

    /// Record an agent spawn, returning the task id
    fn record_agent_spawn(
        &self,
        run_id: &RunId,
        step: PipelineStep,
        agent_id: &str,
    ) -> Result<i64, StoreError>;

    /// Record a task's terminal transition together with its raw output
    fn record_agent_completion(
        &self,
        task_id: i64,
        status: TaskStatus,
        raw_output: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Upsert the artifact for (run, step, agent)
    fn store_artifact(&self, artifact: &ConsensusArtifact) -> Result<(), StoreError>;

    /// Append a synthesis record, returning its row id; never a no-op
    fn store_synthesis(&self, record: &SynthesisRecord) -> Result<i64, StoreError>;

    /// Current (latest) synthesis for a (run, step), if any
    fn latest_synthesis(
        &self,
        run_id: &RunId,
        step: PipelineStep,
    ) -> Result<Option<SynthesisRecord>, StoreError>;

    /// Historical synthesis row count for a (run, step)
    fn synthesis_count(&self, run_id: &RunId, step: PipelineStep) -> Result<usize, StoreError>;

    fn artifacts_for_step(
        &self,
        run_id: &RunId,
        step: PipelineStep,
    ) -> Result<Vec<ConsensusArtifact>, StoreError>;

    fn tasks_for_run(&self, run_id: &RunId) -> Result<Vec<AgentTask>, StoreError>;
}
