//! Run status view
//!
//! Read-only projection of a run's progress, built entirely from the
//! store so it reflects persisted truth rather than in-memory state.

use std::sync::Arc;

use conclave_domain::{GateVerdict, Run, SpecId, Stage, TaskStatus};
use serde::Serialize;
use thiserror::Error;

use crate::ports::run_store::{RunStore, StoreError};

#[derive(Error, Debug)]
pub enum StatusError {
    #[error("No runs recorded for {0}")]
    NoRuns(SpecId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Per-stage slice of the status view
#[derive(Debug, Clone, Serialize)]
pub struct StageStatus {
    pub stage: Stage,
    pub synthesized: bool,
    pub degraded: bool,
    pub artifact_count: usize,
    pub verdict: Option<GateVerdict>,
}

/// Snapshot of the latest run for a specification
#[derive(Debug, Clone, Serialize)]
pub struct RunStatusView {
    pub run: Run,
    pub stages: Vec<StageStatus>,
    pub tasks_total: usize,
    pub tasks_completed: usize,
    pub tasks_timed_out: usize,
    pub tasks_failed: usize,
}

pub struct StatusUseCase {
    store: Arc<dyn RunStore>,
}

impl StatusUseCase {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    /// Build the status view for a specification's latest run
    pub fn latest(&self, spec_id: &SpecId) -> Result<RunStatusView, StatusError> {
        let run = self
            .store
            .latest_run_for_spec(spec_id)?
            .ok_or_else(|| StatusError::NoRuns(spec_id.clone()))?;

        let mut stages = Vec::with_capacity(Stage::all().len());
        for stage in Stage::all() {
            let synthesis = self.store.latest_synthesis(&run.id, stage.into())?;
            stages.push(match synthesis {
                Some(record) => StageStatus {
                    stage,
                    synthesized: true,
                    degraded: record.degraded,
                    artifact_count: record.artifact_count,
                    verdict: record.verdict,
                },
                None => StageStatus {
                    stage,
                    synthesized: false,
                    degraded: false,
                    artifact_count: 0,
                    verdict: None,
                },
            });
        }

        let tasks = self.store.tasks_for_run(&run.id)?;
        Ok(RunStatusView {
            tasks_total: tasks.len(),
            tasks_completed: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Completed)
                .count(),
            tasks_timed_out: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::TimedOut)
                .count(),
            tasks_failed: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Failed)
                .count(),
            run,
            stages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::testing::MemoryStore;
    use chrono::Utc;
    use conclave_domain::{RunId, RunPhase, RunStatus};

    #[test]
    fn test_no_runs_is_an_explicit_error() {
        let uc = StatusUseCase::new(Arc::new(MemoryStore::new()));
        assert!(matches!(
            uc.latest(&SpecId::from("SPEC-1")),
            Err(StatusError::NoRuns(_))
        ));
    }

    #[test]
    fn test_view_reflects_persisted_run() {
        let store = Arc::new(MemoryStore::new());
        let run = Run {
            id: RunId("SPEC-1_1_aa".into()),
            spec_id: SpecId::from("SPEC-1"),
            phase: RunPhase::Stage(Stage::Tasks),
            status: RunStatus::InProgress,
            created_at: Utc::now(),
        };
        store.create_run(&run).unwrap();

        let view = StatusUseCase::new(store)
            .latest(&SpecId::from("SPEC-1"))
            .unwrap();
        assert_eq!(view.run.id, run.id);
        assert_eq!(view.stages.len(), Stage::all().len());
        assert!(view.stages.iter().all(|s| !s.synthesized));
        assert_eq!(view.tasks_total, 0);
    }
}
