//! Consensus synthesis use case
//!
//! Reduces one step's artifact set to a single synthesis record. Below
//! quorum nothing is written and the step is reported unconsensed; at or
//! above quorum the record is appended to the store and the deliverable
//! and evidence files are rewritten unconditionally. Skip-if-exists
//! short-circuits are forbidden here: they freeze a re-run's output at
//! a stale version.

use std::sync::Arc;

use chrono::Utc;
use conclave_domain::{
    collect_consensus_lists, compose_deliverable, ConsensusArtifact, GateVerdict, PipelineStep,
    QuorumDecision, QuorumPolicy, Roster, RunId, SpecId, SynthesisRecord,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::ports::evidence_sink::{EvidenceError, EvidenceSink};
use crate::ports::progress::ProgressNotifier;
use crate::ports::run_store::{RunStore, StoreError};

#[derive(Error, Debug)]
pub enum SynthesizeError {
    /// Below quorum; no record was produced and the caller decides
    /// whether to retry the step or abort the run
    #[error("Step {step} unconsensed: {usable} usable artifact(s), {required} required; missing: {missing:?}")]
    QuorumNotMet {
        step: PipelineStep,
        usable: usize,
        required: usize,
        missing: Vec<String>,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Evidence error: {0}")]
    Evidence(#[from] EvidenceError),
}

/// Everything synthesis needs for one step
pub struct SynthesisInput<'a> {
    pub run_id: &'a RunId,
    pub spec_id: &'a SpecId,
    pub step: PipelineStep,
    pub roster: &'a Roster,
    pub quorum: QuorumPolicy,
    pub artifacts: &'a [ConsensusArtifact],
    /// Verdict computed by the gate broker; `None` for plain stages
    pub verdict: Option<GateVerdict>,
}

pub struct SynthesizeUseCase {
    store: Arc<dyn RunStore>,
    evidence: Arc<dyn EvidenceSink>,
}

impl SynthesizeUseCase {
    pub fn new(store: Arc<dyn RunStore>, evidence: Arc<dyn EvidenceSink>) -> Self {
        Self { store, evidence }
    }

    /// Synthesize one step's consensus and persist it
    pub fn synthesize(
        &self,
        input: SynthesisInput<'_>,
        progress: &dyn ProgressNotifier,
    ) -> Result<SynthesisRecord, SynthesizeError> {
        let usable: Vec<&ConsensusArtifact> =
            input.artifacts.iter().filter(|a| a.is_usable()).collect();
        let usable_agents: Vec<&str> = usable.iter().map(|a| a.agent_id.as_str()).collect();
        let missing = input.roster.missing(usable_agents.iter().copied());

        let decision = input.quorum.decide(input.roster.len(), usable.len());
        match decision {
            QuorumDecision::NotMet { usable, required } => {
                warn!(
                    run_id = %input.run_id,
                    step = %input.step,
                    usable,
                    required,
                    ?missing,
                    "quorum not met, no synthesis record produced"
                );
                return Err(SynthesizeError::QuorumNotMet {
                    step: input.step,
                    usable,
                    required,
                    missing,
                });
            }
            QuorumDecision::Degraded { usable, required } => {
                info!(
                    run_id = %input.run_id,
                    step = %input.step,
                    usable,
                    required,
                    "quorum met degraded"
                );
            }
            QuorumDecision::Met { usable, .. } => {
                info!(run_id = %input.run_id, step = %input.step, usable, "quorum met");
            }
        }

        let now = Utc::now();
        let deliverable = compose_deliverable(
            input.spec_id,
            input.step,
            input.artifacts,
            &missing,
            decision.is_degraded(),
            now,
        );
        let (agreements, conflicts) = collect_consensus_lists(&usable);

        let record = SynthesisRecord {
            run_id: input.run_id.clone(),
            step: input.step,
            artifact_count: usable.len(),
            quorum_required: decision.required(),
            degraded: decision.is_degraded(),
            verdict: input.verdict,
            deliverable,
            agreements,
            conflicts,
            missing_agents: missing,
            created_at: now,
        };

        // Append the record, then rewrite deliverable and evidence;
        // both overwrite whatever a prior synthesis left behind
        self.store.store_synthesis(&record)?;
        self.evidence.write_deliverable(input.spec_id, &record)?;
        self.evidence.record_synthesis(input.spec_id, &record)?;
        progress.on_synthesis(input.step, record.degraded);

        Ok(record)
    }
}
