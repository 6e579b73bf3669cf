//! Evidence re-export
//!
//! The evidence tree is regenerated automatically after every
//! synthesis; this use case rebuilds it on demand from the store, for
//! a tree that was moved, deleted or produced by an older version.

use std::sync::Arc;

use conclave_domain::{PipelineStep, QualityGate, SpecId, Stage};
use thiserror::Error;
use tracing::info;

use crate::ports::evidence_sink::{EvidenceError, EvidenceSink};
use crate::ports::run_store::{RunStore, StoreError};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No runs recorded for {0}")]
    NoRuns(SpecId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Evidence error: {0}")]
    Evidence(#[from] EvidenceError),
}

pub struct ExportUseCase {
    store: Arc<dyn RunStore>,
    evidence: Arc<dyn EvidenceSink>,
}

impl ExportUseCase {
    pub fn new(store: Arc<dyn RunStore>, evidence: Arc<dyn EvidenceSink>) -> Self {
        Self { store, evidence }
    }

    /// Rebuild evidence for the latest run of a specification
    ///
    /// Returns the number of steps exported. Only the current (latest)
    /// synthesis per step is exported; superseded records stay in the
    /// store.
    pub fn export_latest(&self, spec_id: &SpecId) -> Result<usize, ExportError> {
        let run = self
            .store
            .latest_run_for_spec(spec_id)?
            .ok_or_else(|| ExportError::NoRuns(spec_id.clone()))?;

        let mut exported = 0;
        let steps = Stage::all()
            .into_iter()
            .map(PipelineStep::Stage)
            .chain(QualityGate::all().into_iter().map(PipelineStep::Gate));
        for step in steps {
            if let Some(record) = self.store.latest_synthesis(&run.id, step)? {
                self.evidence.record_synthesis(spec_id, &record)?;
                self.evidence.write_deliverable(spec_id, &record)?;
                exported += 1;
            }
        }

        info!(spec_id = %spec_id, run_id = %run.id, exported, "evidence exported");
        Ok(exported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::evidence_sink::NoEvidence;
    use crate::use_cases::testing::MemoryStore;
    use chrono::Utc;
    use conclave_domain::{Run, RunId, RunPhase, RunStatus, SynthesisRecord};
    use std::sync::Mutex;

    struct RecordingSink {
        steps: Mutex<Vec<PipelineStep>>,
    }

    impl EvidenceSink for RecordingSink {
        fn record_synthesis(
            &self,
            _spec_id: &SpecId,
            record: &SynthesisRecord,
        ) -> Result<(), EvidenceError> {
            self.steps.lock().unwrap().push(record.step);
            Ok(())
        }

        fn write_deliverable(
            &self,
            _spec_id: &SpecId,
            _record: &SynthesisRecord,
        ) -> Result<(), EvidenceError> {
            Ok(())
        }
    }

    fn synthesized_run(store: &MemoryStore, steps: &[PipelineStep]) -> Run {
        let run = Run {
            id: RunId("SPEC-1_1_aa".into()),
            spec_id: SpecId::from("SPEC-1"),
            phase: RunPhase::Completed,
            status: RunStatus::Completed,
            created_at: Utc::now(),
        };
        store.create_run(&run).unwrap();
        for step in steps {
            store
                .store_synthesis(&SynthesisRecord {
                    run_id: run.id.clone(),
                    step: *step,
                    artifact_count: 2,
                    quorum_required: 2,
                    degraded: false,
                    verdict: None,
                    deliverable: "content".into(),
                    agreements: vec![],
                    conflicts: vec![],
                    missing_agents: vec![],
                    created_at: Utc::now(),
                })
                .unwrap();
        }
        run
    }

    #[test]
    fn test_exports_only_synthesized_steps() {
        let store = Arc::new(MemoryStore::new());
        let steps = [
            PipelineStep::Stage(Stage::Plan),
            PipelineStep::Gate(QualityGate::Analyze),
        ];
        synthesized_run(&store, &steps);

        let sink = Arc::new(RecordingSink {
            steps: Mutex::new(Vec::new()),
        });
        let exported = ExportUseCase::new(store, Arc::clone(&sink) as Arc<dyn EvidenceSink>)
            .export_latest(&SpecId::from("SPEC-1"))
            .unwrap();

        assert_eq!(exported, 2);
        let seen = sink.steps.lock().unwrap();
        assert!(seen.contains(&PipelineStep::Stage(Stage::Plan)));
        assert!(seen.contains(&PipelineStep::Gate(QualityGate::Analyze)));
    }

    #[test]
    fn test_export_without_runs_is_an_error() {
        let uc = ExportUseCase::new(Arc::new(MemoryStore::new()), Arc::new(NoEvidence));
        assert!(matches!(
            uc.export_latest(&SpecId::from("SPEC-1")),
            Err(ExportError::NoRuns(_))
        ));
    }
}
