//! Step execution use case
//!
//! Fans one step's prompt out to the roster, waits behind a timeout
//! barrier, and normalizes each agent's raw text into a candidate
//! artifact. Every terminal agent state is persisted as it lands, so a
//! crash mid-step leaves auditable partial state in the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use conclave_domain::{
    extract_payload, extract_stage_payload, AgentOutcome, AgentSpec, ConsensusArtifact,
    ExecutionMode, Extraction, OutcomeStatus, PipelineStep, Roster, RunId, SpecId, TaskStatus,
};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ports::agent_transport::{AgentPrompt, AgentTransport, TransportError};
use crate::ports::progress::ProgressNotifier;
use crate::ports::run_store::{RunStore, StoreError};

/// Errors that abort a step outright
///
/// Individual agent failures and timeouts are not errors here; they are
/// absorbed into the outcome set and resolved by quorum policy.
#[derive(Error, Debug)]
pub enum RunStepError {
    #[error("Roster is empty")]
    EmptyRoster,

    #[error("Step cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// One step's worth of fan-out work
#[derive(Debug, Clone)]
pub struct StepRequest {
    pub run_id: RunId,
    pub spec_id: SpecId,
    pub step: PipelineStep,
    pub roster: Roster,
    pub mode: ExecutionMode,
    pub timeout: Duration,
    /// Instruction body shared by every agent in the roster
    pub body: String,
    /// Pre-fetched context, if the context source supplied any
    pub context: Option<String>,
}

/// Everything a step's fan-out produced
#[derive(Debug)]
pub struct StepExecution {
    pub outcomes: Vec<AgentOutcome>,
    pub artifacts: Vec<ConsensusArtifact>,
}

impl StepExecution {
    /// Artifacts that count toward quorum content
    pub fn usable_artifacts(&self) -> usize {
        self.artifacts.iter().filter(|a| a.is_usable()).count()
    }
}

/// Coordinates the roster for one step
pub struct AgentCoordinator<T: AgentTransport + 'static> {
    transport: Arc<T>,
    store: Arc<dyn RunStore>,
}

impl<T: AgentTransport + 'static> AgentCoordinator<T> {
    pub fn new(transport: Arc<T>, store: Arc<dyn RunStore>) -> Self {
        Self { transport, store }
    }

    pub async fn execute(
        &self,
        request: &StepRequest,
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<StepExecution, RunStepError> {
        if request.roster.is_empty() {
            return Err(RunStepError::EmptyRoster);
        }
        if cancel.is_cancelled() {
            return Err(RunStepError::Cancelled);
        }

        info!(
            run_id = %request.run_id,
            step = %request.step,
            agents = request.roster.len(),
            mode = ?request.mode,
            "starting step fan-out"
        );
        progress.on_step_start(request.step, request.roster.len());

        match request.mode {
            ExecutionMode::Sequential => self.run_sequential(request, cancel, progress).await,
            ExecutionMode::Parallel => self.run_parallel(request, cancel, progress).await,
        }
    }

    /// One agent at a time; each result is persisted as soon as it
    /// returns, enabling early partial-failure detection
    async fn run_sequential(
        &self,
        request: &StepRequest,
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<StepExecution, RunStepError> {
        let mut outcomes = Vec::new();
        let mut artifacts = Vec::new();

        for agent in request.roster.iter() {
            if cancel.is_cancelled() {
                return Err(RunStepError::Cancelled);
            }

            let task_id =
                self.store
                    .record_agent_spawn(&request.run_id, request.step, &agent.id)?;
            let prompt = self.prompt_for(request);
            let started = Instant::now();

            let invocation = self.transport.invoke(agent, &prompt);
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    self.store
                        .record_agent_completion(task_id, TaskStatus::Failed, None)?;
                    return Err(RunStepError::Cancelled);
                }
                result = tokio::time::timeout(request.timeout, invocation) => result,
            };
            let elapsed = started.elapsed();

            let (outcome, artifact) = match result {
                Ok(invocation_result) => {
                    self.settle_agent(request, agent, task_id, invocation_result, elapsed)?
                }
                Err(_) => {
                    self.store
                        .record_agent_completion(task_id, TaskStatus::TimedOut, None)?;
                    warn!(agent = %agent.id, step = %request.step, "agent timed out");
                    (AgentOutcome::timed_out(&agent.id, elapsed), None)
                }
            };

            progress.on_agent_complete(request.step, &outcome.agent_id, outcome.status);
            outcomes.push(outcome);
            artifacts.extend(artifact);
        }

        Ok(StepExecution {
            outcomes,
            artifacts,
        })
    }

    /// All agents concurrently behind a shared deadline; stragglers are
    /// marked timed-out and excluded, completed outcomes are retained
    async fn run_parallel(
        &self,
        request: &StepRequest,
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<StepExecution, RunStepError> {
        let deadline = Instant::now() + request.timeout;
        let mut join_set = JoinSet::new();
        let mut pending: HashMap<usize, (AgentSpec, i64)> = HashMap::new();

        for (idx, agent) in request.roster.iter().enumerate() {
            let task_id =
                self.store
                    .record_agent_spawn(&request.run_id, request.step, &agent.id)?;
            pending.insert(idx, (agent.clone(), task_id));

            let transport = Arc::clone(&self.transport);
            let agent = agent.clone();
            let prompt = self.prompt_for(request);
            join_set.spawn(async move {
                let started = Instant::now();
                let result = transport.invoke(&agent, &prompt).await;
                (idx, result, started.elapsed())
            });
        }

        let mut outcomes = Vec::new();
        let mut artifacts = Vec::new();

        while !join_set.is_empty() {
            tokio::select! {
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    for (agent, task_id) in pending.values() {
                        self.store
                            .record_agent_completion(*task_id, TaskStatus::Failed, None)?;
                        debug!(agent = %agent.id, "agent cancelled");
                    }
                    return Err(RunStepError::Cancelled);
                }
                _ = tokio::time::sleep_until(deadline) => {
                    join_set.abort_all();
                    for (agent, task_id) in pending.values() {
                        self.store
                            .record_agent_completion(*task_id, TaskStatus::TimedOut, None)?;
                        warn!(agent = %agent.id, step = %request.step, "agent timed out at barrier");
                        let outcome =
                            AgentOutcome::timed_out(&agent.id, request.timeout);
                        progress.on_agent_complete(request.step, &outcome.agent_id, outcome.status);
                        outcomes.push(outcome);
                    }
                    break;
                }
                joined = join_set.join_next() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok((idx, result, elapsed)) => {
                            let Some((agent, task_id)) = pending.remove(&idx) else {
                                continue;
                            };
                            let (outcome, artifact) =
                                self.settle_agent(request, &agent, task_id, result, elapsed)?;
                            progress.on_agent_complete(
                                request.step,
                                &outcome.agent_id,
                                outcome.status,
                            );
                            outcomes.push(outcome);
                            artifacts.extend(artifact);
                        }
                        Err(join_err) => {
                            warn!(error = %join_err, "agent task join failure");
                        }
                    }
                }
            }
        }

        Ok(StepExecution {
            outcomes,
            artifacts,
        })
    }

    fn prompt_for(&self, request: &StepRequest) -> AgentPrompt {
        AgentPrompt::new(
            request.run_id.clone(),
            request.spec_id.clone(),
            request.step,
            request.body.clone(),
        )
        .with_context(request.context.clone())
    }

    /// Persist one agent's terminal state and extract its artifact
    ///
    /// Transport failure yields a failed outcome with no artifact. A
    /// completed agent always yields an artifact, even when extraction
    /// fails; the failed artifact keeps completion bookkeeping honest
    /// without counting toward quorum content.
    fn settle_agent(
        &self,
        request: &StepRequest,
        agent: &AgentSpec,
        task_id: i64,
        result: Result<String, TransportError>,
        elapsed: Duration,
    ) -> Result<(AgentOutcome, Option<ConsensusArtifact>), RunStepError> {
        match result {
            Ok(raw) => {
                self.store
                    .record_agent_completion(task_id, TaskStatus::Completed, Some(&raw))?;

                let Extraction { payload, status } = match request.step {
                    PipelineStep::Stage(stage) => extract_stage_payload(stage, &raw),
                    PipelineStep::Gate(_) => extract_payload(&raw),
                };
                debug!(
                    agent = %agent.id,
                    step = %request.step,
                    extraction = status.as_str(),
                    "agent completed"
                );

                let artifact = ConsensusArtifact {
                    run_id: request.run_id.clone(),
                    step: request.step,
                    agent_id: agent.id.clone(),
                    payload,
                    extraction_status: status,
                };
                self.store.store_artifact(&artifact)?;

                Ok((
                    AgentOutcome::completed(&agent.id, raw, elapsed),
                    Some(artifact),
                ))
            }
            Err(e) => {
                self.store
                    .record_agent_completion(task_id, TaskStatus::Failed, None)?;
                warn!(agent = %agent.id, step = %request.step, error = %e, "agent failed");
                Ok((AgentOutcome::failed(&agent.id, elapsed), None))
            }
        }
    }
}
