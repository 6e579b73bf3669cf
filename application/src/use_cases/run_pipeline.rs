//! Pipeline state machine use case
//!
//! Drives a run through the stage order. Transitions are strictly
//! linear; each one is driven by a successful synthesis (or passing gate
//! verdict), and the new phase is persisted before any agent for the
//! next stage is spawned, so a crash between stages recovers from the
//! last persisted phase. Resuming from a chosen stage always creates a
//! new run record for the same specification.

use std::sync::Arc;

use chrono::Utc;
use conclave_domain::{
    PipelineStep, Run, RunId, RunPhase, RunStatus, SpecId, Stage, SynthesisRecord,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{ExecutionParams, PipelinePlan};
use crate::ports::agent_transport::AgentTransport;
use crate::ports::context_source::ContextSource;
use crate::ports::evidence_sink::EvidenceSink;
use crate::ports::progress::ProgressNotifier;
use crate::ports::run_store::{RunStore, StoreError};
use crate::use_cases::quality_gate::{GateError, QualityGateUseCase};
use crate::use_cases::run_step::{AgentCoordinator, RunStepError, StepRequest};
use crate::use_cases::synthesize::{SynthesisInput, SynthesizeError, SynthesizeUseCase};

/// Run-level failures, each naming a materially different operator action
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The stage could not reach quorum on any permitted attempt
    #[error("Stage {stage} failed to reach quorum after {attempts} attempt(s): {usable} usable artifact(s), {required} required; missing: {missing:?}")]
    StageUnconsensed {
        stage: Stage,
        attempts: usize,
        usable: usize,
        required: usize,
        missing: Vec<String>,
    },

    /// A quality gate rejected content or stayed unconsensed
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("Run {0} is already terminal")]
    AlreadyTerminal(RunId),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Step error: {0}")]
    Step(RunStepError),

    #[error("Synthesis error: {0}")]
    Synthesize(SynthesizeError),
}

impl From<RunStepError> for PipelineError {
    fn from(e: RunStepError) -> Self {
        match e {
            RunStepError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Step(other),
        }
    }
}

pub struct RunPipelineUseCase<T: AgentTransport + 'static> {
    coordinator: Arc<AgentCoordinator<T>>,
    gate: QualityGateUseCase<T>,
    synthesizer: SynthesizeUseCase,
    store: Arc<dyn RunStore>,
    context: Arc<dyn ContextSource>,
    params: ExecutionParams,
    plan: PipelinePlan,
}

impl<T: AgentTransport + 'static> RunPipelineUseCase<T> {
    pub fn new(
        transport: Arc<T>,
        store: Arc<dyn RunStore>,
        evidence: Arc<dyn EvidenceSink>,
        context: Arc<dyn ContextSource>,
        params: ExecutionParams,
        plan: PipelinePlan,
    ) -> Self {
        let coordinator = Arc::new(AgentCoordinator::new(transport, Arc::clone(&store)));
        let gate = QualityGateUseCase::new(
            Arc::clone(&coordinator),
            Arc::clone(&store),
            Arc::clone(&evidence),
        );
        let synthesizer = SynthesizeUseCase::new(Arc::clone(&store), evidence);
        Self {
            coordinator,
            gate,
            synthesizer,
            store,
            context,
            params,
            plan,
        }
    }

    /// Start a fresh run at the first stage
    pub async fn start(
        &self,
        spec_id: &SpecId,
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<Run, PipelineError> {
        self.launch(spec_id, RunPhase::initial(), cancel, progress)
            .await
    }

    /// Start a new run for the same specification at a chosen stage
    pub async fn resume(
        &self,
        spec_id: &SpecId,
        from: Stage,
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<Run, PipelineError> {
        self.launch(spec_id, RunPhase::Stage(from), cancel, progress)
            .await
    }

    /// Continue an interrupted run from its last persisted phase
    pub async fn continue_run(
        &self,
        run_id: &RunId,
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<Run, PipelineError> {
        let run = self.store.load_run(run_id)?;
        if run.phase.is_terminal() {
            return Err(PipelineError::AlreadyTerminal(run.id.clone()));
        }
        info!(run_id = %run.id, phase = %run.phase, "continuing run");
        self.drive(run, cancel, progress).await
    }

    async fn launch(
        &self,
        spec_id: &SpecId,
        phase: RunPhase,
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<Run, PipelineError> {
        let run = Run {
            id: new_run_id(spec_id),
            spec_id: spec_id.clone(),
            phase,
            status: RunStatus::InProgress,
            created_at: Utc::now(),
        };
        self.store.create_run(&run)?;
        info!(run_id = %run.id, spec_id = %spec_id, phase = %run.phase, "run created");
        self.drive(run, cancel, progress).await
    }

    async fn drive(
        &self,
        mut run: Run,
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<Run, PipelineError> {
        while let RunPhase::Stage(stage) = run.phase {
            if cancel.is_cancelled() {
                // Leave the run in-progress; it can be continued later
                return Err(PipelineError::Cancelled);
            }

            for gate in self.plan.gates_before(stage) {
                if let Err(e) = self.run_gate(&run, *gate, cancel, progress).await {
                    return self.fail_run(run, e).await;
                }
            }

            match self.run_stage(&run, stage, cancel, progress).await {
                Ok(_record) => {}
                Err(e @ PipelineError::Cancelled) => return Err(e),
                Err(e) => return self.fail_run(run, e).await,
            }

            run.phase = run.phase.advanced();
            self.store.advance_phase(&run.id, run.phase)?;
            progress.on_phase_advance(&run.phase);
            info!(run_id = %run.id, phase = %run.phase, "phase persisted");
        }

        run.status = match run.phase {
            RunPhase::Completed => RunStatus::Completed,
            _ => RunStatus::Failed,
        };
        self.store.finish_run(&run.id, run.status)?;
        info!(run_id = %run.id, status = run.status.as_str(), "run finished");
        Ok(run)
    }

    async fn fail_run(&self, run: Run, e: PipelineError) -> Result<Run, PipelineError> {
        error!(run_id = %run.id, error = %e, "run failed");
        if let Err(store_err) = self.store.finish_run(&run.id, RunStatus::Failed) {
            error!(run_id = %run.id, error = %store_err, "failed to record run failure");
        }
        Err(e)
    }

    async fn run_gate(
        &self,
        run: &Run,
        gate: conclave_domain::QualityGate,
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<SynthesisRecord, PipelineError> {
        let step = PipelineStep::Gate(gate);
        let context = self.fetch_context(&run.spec_id, step).await;
        let base = StepRequest {
            run_id: run.id.clone(),
            spec_id: run.spec_id.clone(),
            step,
            roster: self.plan.roster.clone(),
            mode: self.params.mode,
            timeout: self.params.step_timeout,
            body: gate_body(gate),
            context,
        };
        let passed = self
            .gate
            .execute(gate, &base, &self.plan.roster, &self.params, cancel, progress)
            .await?;
        Ok(passed.record)
    }

    async fn run_stage(
        &self,
        run: &Run,
        stage: Stage,
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<SynthesisRecord, PipelineError> {
        let step = PipelineStep::Stage(stage);
        let context = self.fetch_context(&run.spec_id, step).await;
        let request = StepRequest {
            run_id: run.id.clone(),
            spec_id: run.spec_id.clone(),
            step,
            roster: self.plan.roster.clone(),
            mode: self.plan.mode_for(stage, self.params.mode),
            timeout: self.params.step_timeout,
            body: stage_body(stage),
            context,
        };

        let max_attempts = self.params.stage_max_retries + 1;
        let mut last = None;
        for attempt in 1..=max_attempts {
            let execution = self.coordinator.execute(&request, cancel, progress).await?;
            match self.synthesizer.synthesize(
                SynthesisInput {
                    run_id: &run.id,
                    spec_id: &run.spec_id,
                    step,
                    roster: &self.plan.roster,
                    quorum: self.params.quorum,
                    artifacts: &execution.artifacts,
                    verdict: None,
                },
                progress,
            ) {
                Ok(record) => return Ok(record),
                Err(SynthesizeError::QuorumNotMet {
                    usable,
                    required,
                    missing,
                    ..
                }) => {
                    warn!(
                        run_id = %run.id,
                        stage = %stage,
                        attempt,
                        usable,
                        required,
                        "stage unconsensed"
                    );
                    last = Some((usable, required, missing));
                }
                Err(e) => return Err(PipelineError::Synthesize(e)),
            }
        }

        let (usable, required, missing) = last.unwrap_or((0, 0, Vec::new()));
        Err(PipelineError::StageUnconsensed {
            stage,
            attempts: max_attempts,
            usable,
            required,
            missing,
        })
    }

    /// Context pre-fetch; failure degrades to no context and never
    /// blocks the step
    async fn fetch_context(&self, spec_id: &SpecId, step: PipelineStep) -> Option<String> {
        match self.context.fetch(spec_id, step).await {
            Ok(context) => context,
            Err(e) => {
                warn!(spec_id = %spec_id, step = %step, error = %e, "context fetch failed, proceeding without");
                None
            }
        }
    }
}

fn new_run_id(spec_id: &SpecId) -> RunId {
    let uuid = Uuid::new_v4().simple().to_string();
    RunId(format!(
        "{}_{}_{}",
        spec_id,
        Utc::now().timestamp(),
        &uuid[..8]
    ))
}

fn stage_body(stage: Stage) -> String {
    format!(
        "You are one reviewer in a consensus panel for the {} stage.\n\
         Respond with a single JSON object. It must contain a `{}` field \
         with your proposal, and may contain a `consensus` object with \
         `agreements` and `conflicts` string arrays.",
        stage.display_name(),
        stage.required_field()
    )
}

fn gate_body(gate: conclave_domain::QualityGate) -> String {
    format!(
        "You are one reviewer in the {} quality gate.\n\
         Respond with a single JSON object of the form \
         {{\"issues\": [{{\"id\", \"question\", \"answer\", \"confidence\", \
         \"magnitude\", \"resolvability\", \"suggested_fix\"}}]}}. \
         An empty issues array means you approve progression.",
        gate.display_name()
    )
}
