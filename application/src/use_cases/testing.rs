//! In-memory test doubles for the ports

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use conclave_domain::{
    AgentSpec, AgentTask, ConsensusArtifact, PipelineStep, Run, RunId, RunPhase, RunStatus,
    SpecId, SynthesisRecord, TaskStatus,
};

use crate::ports::agent_transport::{AgentPrompt, AgentTransport, TransportError};
use crate::ports::run_store::{RunStore, StoreError};

enum Behavior {
    Respond(String),
    Fail(String),
    Hang,
}

/// Scripted transport; behaviors are keyed by transport-level names and
/// resolved through roster alias matching
pub struct FakeTransport {
    behaviors: Vec<(String, Behavior)>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            behaviors: Vec::new(),
        }
    }

    pub fn respond(mut self, name: &str, output: &str) -> Self {
        self.behaviors
            .push((name.to_string(), Behavior::Respond(output.to_string())));
        self
    }

    pub fn fail(mut self, name: &str, reason: &str) -> Self {
        self.behaviors
            .push((name.to_string(), Behavior::Fail(reason.to_string())));
        self
    }

    pub fn hang(mut self, name: &str) -> Self {
        self.behaviors.push((name.to_string(), Behavior::Hang));
        self
    }
}

#[async_trait]
impl AgentTransport for FakeTransport {
    async fn invoke(
        &self,
        agent: &AgentSpec,
        _prompt: &AgentPrompt,
    ) -> Result<String, TransportError> {
        let behavior = self
            .behaviors
            .iter()
            .find(|(name, _)| agent.matches(name))
            .map(|(_, b)| b);
        match behavior {
            Some(Behavior::Respond(output)) => Ok(output.clone()),
            Some(Behavior::Fail(reason)) => Err(TransportError::SpawnFailed {
                agent: agent.id.clone(),
                reason: reason.clone(),
            }),
            Some(Behavior::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => Err(TransportError::Unavailable(format!(
                "no scripted behavior for {}",
                agent.id
            ))),
        }
    }
}

#[derive(Default)]
struct MemoryState {
    runs: Vec<Run>,
    tasks: Vec<AgentTask>,
    artifacts: Vec<ConsensusArtifact>,
    syntheses: Vec<SynthesisRecord>,
    next_task_id: i64,
}

/// In-memory [`RunStore`] with the same upsert/append semantics as the
/// real adapter
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunStore for MemoryStore {
    fn create_run(&self, run: &Run) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.runs.push(run.clone());
        Ok(())
    }

    fn load_run(&self, run_id: &RunId) -> Result<Run, StoreError> {
        let state = self.state.lock().unwrap();
        state
            .runs
            .iter()
            .find(|r| r.id == *run_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))
    }

    fn latest_run_for_spec(&self, spec_id: &SpecId) -> Result<Option<Run>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .runs
            .iter()
            .filter(|r| r.spec_id == *spec_id)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    fn list_runs(&self, spec_id: &SpecId) -> Result<Vec<Run>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .runs
            .iter()
            .filter(|r| r.spec_id == *spec_id)
            .cloned()
            .collect())
    }

    fn advance_phase(&self, run_id: &RunId, phase: RunPhase) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == *run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        run.phase = phase;
        Ok(())
    }

    fn finish_run(&self, run_id: &RunId, status: RunStatus) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let run = state
            .runs
            .iter_mut()
            .find(|r| r.id == *run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        run.status = status;
        Ok(())
    }

    fn record_agent_spawn(
        &self,
        run_id: &RunId,
        step: PipelineStep,
        agent_id: &str,
    ) -> Result<i64, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.next_task_id += 1;
        let id = state.next_task_id;
        state.tasks.push(AgentTask {
            id,
            run_id: run_id.clone(),
            step,
            agent_id: agent_id.to_string(),
            status: TaskStatus::Running,
            spawned_at: Utc::now(),
            completed_at: None,
            raw_output: None,
        });
        Ok(id)
    }

    fn record_agent_completion(
        &self,
        task_id: i64,
        status: TaskStatus,
        raw_output: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| StoreError::NotFound(format!("task {task_id}")))?;
        task.status = status;
        task.completed_at = Some(Utc::now());
        task.raw_output = raw_output.map(str::to_string);
        Ok(())
    }

    fn store_artifact(&self, artifact: &ConsensusArtifact) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.artifacts.retain(|a| {
            !(a.run_id == artifact.run_id
                && a.step == artifact.step
                && a.agent_id == artifact.agent_id)
        });
        state.artifacts.push(artifact.clone());
        Ok(())
    }

    fn store_synthesis(&self, record: &SynthesisRecord) -> Result<i64, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.syntheses.push(record.clone());
        Ok(state.syntheses.len() as i64)
    }

    fn latest_synthesis(
        &self,
        run_id: &RunId,
        step: PipelineStep,
    ) -> Result<Option<SynthesisRecord>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .syntheses
            .iter()
            .filter(|s| s.run_id == *run_id && s.step == step)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    fn synthesis_count(&self, run_id: &RunId, step: PipelineStep) -> Result<usize, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .syntheses
            .iter()
            .filter(|s| s.run_id == *run_id && s.step == step)
            .count())
    }

    fn artifacts_for_step(
        &self,
        run_id: &RunId,
        step: PipelineStep,
    ) -> Result<Vec<ConsensusArtifact>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .artifacts
            .iter()
            .filter(|a| a.run_id == *run_id && a.step == step)
            .cloned()
            .collect())
    }

    fn tasks_for_run(&self, run_id: &RunId) -> Result<Vec<AgentTask>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tasks
            .iter()
            .filter(|t| t.run_id == *run_id)
            .cloned()
            .collect())
    }
}
