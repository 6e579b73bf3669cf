//! SQLite adapter for the run store
//!
//! Single-writer, multi-reader discipline: one connection behind a
//! mutex, WAL journal so verification reads are not blocked by
//! concurrent writers on other connections. Every write runs inside one
//! transaction and behind the bounded backoff policy; the lock is taken
//! fresh per attempt.

use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use conclave_application::{RunStore, StoreError};
use conclave_domain::{
    AgentTask, ConsensusArtifact, ExtractionStatus, GateVerdict, PipelineStep, Run, RunId,
    RunPhase, RunStatus, SpecId, SynthesisRecord, TaskStatus,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::migrations;
use super::retry::BackoffPolicy;

pub struct SqliteRunStore {
    conn: Mutex<Connection>,
    backoff: BackoffPolicy,
}

impl SqliteRunStore {
    /// Open (and migrate) a store file
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).map_err(map_sqlite_error)?;
        info!(path = %path.as_ref().display(), "opening run store");
        Self::prepare(conn)
    }

    /// In-memory store for tests
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(map_sqlite_error)?;
        Self::prepare(conn)
    }

    fn prepare(mut conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(map_sqlite_error)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(map_sqlite_error)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(map_sqlite_error)?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(map_sqlite_error)?;

        migrations::apply_pending(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            backoff: BackoffPolicy::default(),
        })
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    fn with_conn<T, F>(&self, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut(&mut Connection) -> Result<T, StoreError>,
    {
        self.backoff.run(|| {
            let mut conn = self
                .conn
                .lock()
                .map_err(|_| StoreError::Backend("connection lock poisoned".into()))?;
            op(&mut conn)
        })
    }
}

impl RunStore for SqliteRunStore {
    fn create_run(&self, run: &Run) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO runs (id, spec_id, phase, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    run.id.as_str(),
                    run.spec_id.as_str(),
                    run.phase.as_str(),
                    run.status.as_str(),
                    run.created_at.to_rfc3339(),
                ],
            )
            .map_err(map_sqlite_error)?;
            Ok(())
        })
    }

    fn load_run(&self, run_id: &RunId) -> Result<Run, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, spec_id, phase, status, created_at FROM runs WHERE id = ?1",
                params![run_id.as_str()],
                row_to_run,
            )
            .optional()
            .map_err(map_sqlite_error)?
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))
        })
    }

    fn latest_run_for_spec(&self, spec_id: &SpecId) -> Result<Option<Run>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, spec_id, phase, status, created_at FROM runs
                 WHERE spec_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![spec_id.as_str()],
                row_to_run,
            )
            .optional()
            .map_err(map_sqlite_error)
        })
    }

    fn list_runs(&self, spec_id: &SpecId) -> Result<Vec<Run>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, spec_id, phase, status, created_at FROM runs
                     WHERE spec_id = ?1 ORDER BY created_at ASC, id ASC",
                )
                .map_err(map_sqlite_error)?;
            let rows = stmt
                .query_map(params![spec_id.as_str()], row_to_run)
                .map_err(map_sqlite_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite_error)
        })
    }

    fn advance_phase(&self, run_id: &RunId, phase: RunPhase) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE runs SET phase = ?1 WHERE id = ?2",
                    params![phase.as_str(), run_id.as_str()],
                )
                .map_err(map_sqlite_error)?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("run {run_id}")));
            }
            Ok(())
        })
    }

    fn finish_run(&self, run_id: &RunId, status: RunStatus) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE runs SET status = ?1 WHERE id = ?2",
                    params![status.as_str(), run_id.as_str()],
                )
                .map_err(map_sqlite_error)?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("run {run_id}")));
            }
            Ok(())
        })
    }

    fn record_agent_spawn(
        &self,
        run_id: &RunId,
        step: PipelineStep,
        agent_id: &str,
    ) -> Result<i64, StoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO agent_tasks (run_id, step, agent_id, status, spawned_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    run_id.as_str(),
                    step.as_str(),
                    agent_id,
                    TaskStatus::Running.as_str(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(map_sqlite_error)?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn record_agent_completion(
        &self,
        task_id: i64,
        status: TaskStatus,
        raw_output: Option<&str>,
    ) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let changed = conn
                .execute(
                    "UPDATE agent_tasks SET status = ?1, completed_at = ?2, raw_output = ?3
                     WHERE id = ?4",
                    params![
                        status.as_str(),
                        Utc::now().to_rfc3339(),
                        raw_output,
                        task_id
                    ],
                )
                .map_err(map_sqlite_error)?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("task {task_id}")));
            }
            Ok(())
        })
    }

    fn store_artifact(&self, artifact: &ConsensusArtifact) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&artifact.payload)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO artifacts (run_id, step, agent_id, payload, extraction_status)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (run_id, step, agent_id)
                 DO UPDATE SET payload = ?4, extraction_status = ?5",
                params![
                    artifact.run_id.as_str(),
                    artifact.step.as_str(),
                    artifact.agent_id,
                    payload,
                    artifact.extraction_status.as_str(),
                ],
            )
            .map_err(map_sqlite_error)?;
            Ok(())
        })
    }

    fn store_synthesis(&self, record: &SynthesisRecord) -> Result<i64, StoreError> {
        let verdict = record
            .verdict
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let agreements = serde_json::to_string(&record.agreements)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let conflicts = serde_json::to_string(&record.conflicts)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let missing = serde_json::to_string(&record.missing_agents)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO synthesis (run_id, step, artifact_count, quorum_required,
                     degraded, verdict, deliverable, agreements, conflicts,
                     missing_agents, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    record.run_id.as_str(),
                    record.step.as_str(),
                    record.artifact_count as i64,
                    record.quorum_required as i64,
                    record.degraded,
                    verdict,
                    record.deliverable,
                    agreements,
                    conflicts,
                    missing,
                    record.created_at.to_rfc3339(),
                ],
            )
            .map_err(map_sqlite_error)?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn latest_synthesis(
        &self,
        run_id: &RunId,
        step: PipelineStep,
    ) -> Result<Option<SynthesisRecord>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT run_id, step, artifact_count, quorum_required, degraded,
                        verdict, deliverable, agreements, conflicts, missing_agents, created_at
                 FROM synthesis WHERE run_id = ?1 AND step = ?2
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                params![run_id.as_str(), step.as_str()],
                row_to_synthesis,
            )
            .optional()
            .map_err(map_sqlite_error)
        })
    }

    fn synthesis_count(&self, run_id: &RunId, step: PipelineStep) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM synthesis WHERE run_id = ?1 AND step = ?2",
                    params![run_id.as_str(), step.as_str()],
                    |row| row.get(0),
                )
                .map_err(map_sqlite_error)?;
            Ok(count as usize)
        })
    }

    fn artifacts_for_step(
        &self,
        run_id: &RunId,
        step: PipelineStep,
    ) -> Result<Vec<ConsensusArtifact>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT run_id, step, agent_id, payload, extraction_status
                     FROM artifacts WHERE run_id = ?1 AND step = ?2 ORDER BY agent_id",
                )
                .map_err(map_sqlite_error)?;
            let rows = stmt
                .query_map(params![run_id.as_str(), step.as_str()], row_to_artifact)
                .map_err(map_sqlite_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite_error)
        })
    }

    fn tasks_for_run(&self, run_id: &RunId) -> Result<Vec<AgentTask>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, run_id, step, agent_id, status, spawned_at, completed_at, raw_output
                     FROM agent_tasks WHERE run_id = ?1 ORDER BY id",
                )
                .map_err(map_sqlite_error)?;
            let rows = stmt
                .query_map(params![run_id.as_str()], row_to_task)
                .map_err(map_sqlite_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite_error)
        })
    }
}

fn map_sqlite_error(e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(err, ref msg) = e {
        let detail = msg.clone().unwrap_or_else(|| err.to_string());
        return match err.code {
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                StoreError::Busy(detail)
            }
            rusqlite::ErrorCode::ConstraintViolation => StoreError::Constraint(detail),
            _ => StoreError::Backend(detail),
        };
    }
    StoreError::Backend(e.to_string())
}

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn parse_column<T: FromStr>(raw: String) -> Result<T, rusqlite::Error>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            e.to_string().into(),
        )
    })
}

fn row_to_run(row: &Row<'_>) -> Result<Run, rusqlite::Error> {
    Ok(Run {
        id: RunId(row.get(0)?),
        spec_id: SpecId(row.get(1)?),
        phase: parse_column::<RunPhase>(row.get(2)?)?,
        status: parse_column::<RunStatus>(row.get(3)?)?,
        created_at: parse_timestamp(row.get(4)?)?,
    })
}

fn row_to_task(row: &Row<'_>) -> Result<AgentTask, rusqlite::Error> {
    let completed_at: Option<String> = row.get(6)?;
    Ok(AgentTask {
        id: row.get(0)?,
        run_id: RunId(row.get(1)?),
        step: parse_column::<PipelineStep>(row.get(2)?)?,
        agent_id: row.get(3)?,
        status: parse_column::<TaskStatus>(row.get(4)?)?,
        spawned_at: parse_timestamp(row.get(5)?)?,
        completed_at: completed_at.map(parse_timestamp).transpose()?,
        raw_output: row.get(7)?,
    })
}

fn row_to_artifact(row: &Row<'_>) -> Result<ConsensusArtifact, rusqlite::Error> {
    let payload: String = row.get(3)?;
    Ok(ConsensusArtifact {
        run_id: RunId(row.get(0)?),
        step: parse_column::<PipelineStep>(row.get(1)?)?,
        agent_id: row.get(2)?,
        payload: serde_json::from_str(&payload).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        extraction_status: parse_column::<ExtractionStatus>(row.get(4)?)?,
    })
}

fn row_to_synthesis(row: &Row<'_>) -> Result<SynthesisRecord, rusqlite::Error> {
    let verdict: Option<String> = row.get(5)?;
    let verdict = verdict
        .map(|v| serde_json::from_str::<GateVerdict>(&v))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let parse_list = |idx: usize, raw: String| {
        serde_json::from_str::<Vec<String>>(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    };
    let artifact_count: i64 = row.get(2)?;
    let quorum_required: i64 = row.get(3)?;
    Ok(SynthesisRecord {
        run_id: RunId(row.get(0)?),
        step: parse_column::<PipelineStep>(row.get(1)?)?,
        artifact_count: artifact_count as usize,
        quorum_required: quorum_required as usize,
        degraded: row.get(4)?,
        verdict,
        deliverable: row.get(6)?,
        agreements: parse_list(7, row.get(7)?)?,
        conflicts: parse_list(8, row.get(8)?)?,
        missing_agents: parse_list(9, row.get(9)?)?,
        created_at: parse_timestamp(row.get(10)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::Stage;
    use serde_json::json;

    fn store() -> SqliteRunStore {
        SqliteRunStore::in_memory().unwrap()
    }

    fn sample_run(id: &str) -> Run {
        Run {
            id: RunId(id.to_string()),
            spec_id: SpecId::from("SPEC-1"),
            phase: RunPhase::initial(),
            status: RunStatus::InProgress,
            created_at: Utc::now(),
        }
    }

    fn sample_synthesis(run_id: &str, step: PipelineStep, deliverable: &str) -> SynthesisRecord {
        SynthesisRecord {
            run_id: RunId(run_id.to_string()),
            step,
            artifact_count: 3,
            quorum_required: 2,
            degraded: false,
            verdict: None,
            deliverable: deliverable.to_string(),
            agreements: vec!["use sqlite".to_string()],
            conflicts: vec![],
            missing_agents: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_run_round_trip() {
        let store = store();
        let run = sample_run("r1");
        store.create_run(&run).unwrap();

        let loaded = store.load_run(&run.id).unwrap();
        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.phase, RunPhase::Stage(Stage::Plan));
        assert_eq!(loaded.status, RunStatus::InProgress);
    }

    #[test]
    fn test_duplicate_run_id_is_constraint_error() {
        let store = store();
        store.create_run(&sample_run("r1")).unwrap();
        let result = store.create_run(&sample_run("r1"));
        assert!(matches!(result, Err(StoreError::Constraint(_))));
    }

    #[test]
    fn test_phase_advancement_persists() {
        let store = store();
        let run = sample_run("r1");
        store.create_run(&run).unwrap();

        store
            .advance_phase(&run.id, RunPhase::Stage(Stage::Tasks))
            .unwrap();
        assert_eq!(
            store.load_run(&run.id).unwrap().phase,
            RunPhase::Stage(Stage::Tasks)
        );
    }

    #[test]
    fn test_task_lifecycle() {
        let store = store();
        let run = sample_run("r1");
        store.create_run(&run).unwrap();

        let task_id = store
            .record_agent_spawn(&run.id, Stage::Plan.into(), "claude")
            .unwrap();
        store
            .record_agent_completion(task_id, TaskStatus::Completed, Some("raw text"))
            .unwrap();

        let tasks = store.tasks_for_run(&run.id).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Completed);
        assert_eq!(tasks[0].raw_output.as_deref(), Some("raw text"));
        assert!(tasks[0].completed_at.is_some());
    }

    #[test]
    fn test_artifact_upsert_keeps_one_row_per_agent() {
        let store = store();
        let run = sample_run("r1");
        store.create_run(&run).unwrap();

        let mut artifact = ConsensusArtifact {
            run_id: run.id.clone(),
            step: Stage::Plan.into(),
            agent_id: "claude".to_string(),
            payload: json!({"v": 1}),
            extraction_status: ExtractionStatus::Clean,
        };
        store.store_artifact(&artifact).unwrap();
        artifact.payload = json!({"v": 2});
        store.store_artifact(&artifact).unwrap();

        let artifacts = store.artifacts_for_step(&run.id, Stage::Plan.into()).unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].payload["v"], 2);
    }

    #[test]
    fn test_synthesis_is_append_only_latest_wins() {
        let store = store();
        let run = sample_run("r1");
        store.create_run(&run).unwrap();

        let first = sample_synthesis("r1", Stage::Plan.into(), "old deliverable");
        store.store_synthesis(&first).unwrap();
        let mut second = sample_synthesis("r1", Stage::Plan.into(), "new deliverable");
        second.created_at = first.created_at + chrono::Duration::seconds(5);
        store.store_synthesis(&second).unwrap();

        assert_eq!(store.synthesis_count(&run.id, Stage::Plan.into()).unwrap(), 2);
        let latest = store
            .latest_synthesis(&run.id, Stage::Plan.into())
            .unwrap()
            .unwrap();
        assert_eq!(latest.deliverable, "new deliverable");
        assert_eq!(latest.agreements, vec!["use sqlite".to_string()]);
    }

    #[test]
    fn test_latest_run_for_spec_orders_by_recency() {
        let store = store();
        let mut first = sample_run("r1");
        first.created_at = Utc::now() - chrono::Duration::minutes(5);
        store.create_run(&first).unwrap();
        store.create_run(&sample_run("r2")).unwrap();

        let latest = store
            .latest_run_for_spec(&SpecId::from("SPEC-1"))
            .unwrap()
            .unwrap();
        assert_eq!(latest.id.as_str(), "r2");
        assert_eq!(store.list_runs(&SpecId::from("SPEC-1")).unwrap().len(), 2);
    }

    #[test]
    fn test_gate_synthesis_round_trips_verdict() {
        let store = store();
        let run = sample_run("r1");
        store.create_run(&run).unwrap();

        let mut record = sample_synthesis(
            "r1",
            conclave_domain::QualityGate::Analyze.into(),
            "gate summary",
        );
        record.verdict = Some(GateVerdict::Pass);
        store.store_synthesis(&record).unwrap();

        let loaded = store
            .latest_synthesis(&run.id, conclave_domain::QualityGate::Analyze.into())
            .unwrap()
            .unwrap();
        assert!(loaded.verdict.unwrap().passed());
    }

    #[test]
    fn test_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conclave.db");

        {
            let store = SqliteRunStore::open(&path).unwrap();
            store.create_run(&sample_run("r1")).unwrap();
        }
        let store = SqliteRunStore::open(&path).unwrap();
        assert_eq!(
            store.load_run(&RunId("r1".into())).unwrap().spec_id,
            SpecId::from("SPEC-1")
        );
    }
}
