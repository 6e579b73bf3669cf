//! Quality gate use case
//!
//! A gate reuses the step fan-out machinery but holds agents to a
//! stricter contract: each payload must parse into a validated review,
//! and the synthesis carries a pass/fail verdict. A failing or
//! unconsensed gate is retried a bounded number of times, then the run
//! is halted with the gate's structured issues.

use std::sync::Arc;

use conclave_domain::{
    ConsensusArtifact, GateIssue, GateReview, GateVerdict, PipelineStep, QualityGate,
    QuorumPolicy, Roster, SynthesisRecord,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ExecutionParams;
use crate::ports::agent_transport::AgentTransport;
use crate::ports::evidence_sink::EvidenceSink;
use crate::ports::progress::ProgressNotifier;
use crate::ports::run_store::RunStore;
use crate::use_cases::run_step::{AgentCoordinator, RunStepError, StepRequest};
use crate::use_cases::synthesize::{SynthesisInput, SynthesizeError, SynthesizeUseCase};
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum GateError {
    /// The gate produced a failing verdict on every permitted attempt
    #[error("Gate {gate} rejected content after {attempts} attempt(s): {issues:?}")]
    Rejected {
        gate: QualityGate,
        attempts: usize,
        issues: Vec<GateIssue>,
    },

    /// Too few parseable reviews on every permitted attempt
    #[error("Gate {gate} unconsensed after {attempts} attempt(s): {usable} valid review(s), {required} required")]
    Unconsensed {
        gate: QualityGate,
        attempts: usize,
        usable: usize,
        required: usize,
    },

    #[error("Step error: {0}")]
    Step(#[from] RunStepError),

    #[error("Synthesis error: {0}")]
    Synthesize(SynthesizeError),
}

/// A passing gate's result
#[derive(Debug)]
pub struct GatePassed {
    pub record: SynthesisRecord,
    pub attempts: usize,
}

pub struct QualityGateUseCase<T: AgentTransport + 'static> {
    coordinator: Arc<AgentCoordinator<T>>,
    synthesizer: SynthesizeUseCase,
}

impl<T: AgentTransport + 'static> QualityGateUseCase<T> {
    pub fn new(
        coordinator: Arc<AgentCoordinator<T>>,
        store: Arc<dyn RunStore>,
        evidence: Arc<dyn EvidenceSink>,
    ) -> Self {
        Self {
            coordinator,
            synthesizer: SynthesizeUseCase::new(store, evidence),
        }
    }

    /// Run one gate to a passing verdict, or fail the run
    pub async fn execute(
        &self,
        gate: QualityGate,
        base: &StepRequest,
        roster: &Roster,
        params: &ExecutionParams,
        cancel: &CancellationToken,
        progress: &dyn ProgressNotifier,
    ) -> Result<GatePassed, GateError> {
        let max_attempts = params.gate_max_retries + 1;
        let mut last_quorum: Option<(usize, usize)> = None;
        let mut last_issues: Vec<GateIssue> = Vec::new();

        for attempt in 1..=max_attempts {
            info!(gate = %gate, attempt, max_attempts, "running quality gate");

            let request = StepRequest {
                step: PipelineStep::Gate(gate),
                ..base.clone()
            };
            let execution = self.coordinator.execute(&request, cancel, progress).await?;

            // Strict contract: only artifacts that parse into a review
            // count toward the gate's quorum
            let mut reviews: Vec<GateReview> = Vec::new();
            let mut reviewed: Vec<ConsensusArtifact> = Vec::new();
            for artifact in execution.artifacts {
                if !artifact.is_usable() {
                    continue;
                }
                match GateReview::from_payload(&artifact.agent_id, &artifact.payload) {
                    Ok(review) => {
                        reviews.push(review);
                        reviewed.push(artifact);
                    }
                    Err(e) => {
                        warn!(gate = %gate, error = %e, "discarding malformed gate review");
                    }
                }
            }

            let verdict = GateVerdict::decide(&reviews);
            let synthesis = self.synthesizer.synthesize(
                SynthesisInput {
                    run_id: &request.run_id,
                    spec_id: &request.spec_id,
                    step: request.step,
                    roster,
                    quorum: params.quorum,
                    artifacts: &reviewed,
                    verdict: Some(verdict.clone()),
                },
                progress,
            );

            match synthesis {
                Ok(record) => {
                    progress.on_gate_verdict(gate, verdict.passed());
                    match verdict {
                        GateVerdict::Pass => {
                            return Ok(GatePassed {
                                record,
                                attempts: attempt,
                            });
                        }
                        GateVerdict::Fail { issues } => {
                            warn!(gate = %gate, attempt, blocking = issues.len(), "gate failed");
                            last_issues = issues;
                            last_quorum = None;
                        }
                    }
                }
                Err(SynthesizeError::QuorumNotMet {
                    usable, required, ..
                }) => {
                    last_quorum = Some((usable, required));
                    last_issues.clear();
                }
                Err(e) => return Err(GateError::Synthesize(e)),
            }
        }

        match last_quorum {
            Some((usable, required)) => Err(GateError::Unconsensed {
                gate,
                attempts: max_attempts,
                usable,
                required,
            }),
            None => Err(GateError::Rejected {
                gate,
                attempts: max_attempts,
                issues: last_issues,
            }),
        }
    }
}
