//! Versioned, idempotent schema migrations
//!
//! Applied versions are recorded in `schema_version`; opening a store
//! applies only the pending tail, each migration inside its own
//! transaction. A partially-migrated file is brought forward without
//! re-running anything already recorded as complete.

use conclave_application::StoreError;
use rusqlite::Connection;
use tracing::info;

/// Ordered migration scripts; index + 1 is the schema version
const MIGRATIONS: &[&str] = &[
    // v1: core tables
    "CREATE TABLE runs (
        id TEXT PRIMARY KEY,
        spec_id TEXT NOT NULL,
        phase TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE agent_tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id TEXT NOT NULL REFERENCES runs(id),
        step TEXT NOT NULL,
        agent_id TEXT NOT NULL,
        status TEXT NOT NULL,
        spawned_at TEXT NOT NULL,
        completed_at TEXT,
        raw_output TEXT
    );
    CREATE TABLE artifacts (
        run_id TEXT NOT NULL REFERENCES runs(id),
        step TEXT NOT NULL,
        agent_id TEXT NOT NULL,
        payload TEXT NOT NULL,
        extraction_status TEXT NOT NULL,
        PRIMARY KEY (run_id, step, agent_id)
    );
    CREATE TABLE synthesis (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id TEXT NOT NULL REFERENCES runs(id),
        step TEXT NOT NULL,
        artifact_count INTEGER NOT NULL,
        quorum_required INTEGER NOT NULL,
        degraded INTEGER NOT NULL,
        verdict TEXT,
        deliverable TEXT NOT NULL,
        agreements TEXT NOT NULL,
        conflicts TEXT NOT NULL,
        missing_agents TEXT NOT NULL,
        created_at TEXT NOT NULL
    );",
    // v2: query indexes for status and evidence reads
    "CREATE INDEX idx_runs_spec ON runs(spec_id, created_at);
    CREATE INDEX idx_tasks_run ON agent_tasks(run_id);
    CREATE INDEX idx_synthesis_run_step ON synthesis(run_id, step, created_at);",
];

/// Bring a store file up to the current schema version
pub fn apply_pending(conn: &mut Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )",
        [],
    )
    .map_err(migration_error)?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(migration_error)?;

    for (idx, script) in MIGRATIONS.iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        let tx = conn.transaction().map_err(migration_error)?;
        tx.execute_batch(script).map_err(migration_error)?;
        tx.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(migration_error)?;
        tx.commit().map_err(migration_error)?;
        info!(version, "applied store migration");
    }

    Ok(())
}

fn migration_error(e: rusqlite::Error) -> StoreError {
    StoreError::Migration(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_apply_on_fresh_store() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_pending(&mut conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_reapplying_is_a_no_op() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_pending(&mut conn).unwrap();
        apply_pending(&mut conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, MIGRATIONS.len() as i64);
    }

    #[test]
    fn test_partially_migrated_store_is_brought_forward() {
        let mut conn = Connection::open_in_memory().unwrap();

        // Simulate a store stopped after v1
        conn.execute_batch(
            "CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TEXT NOT NULL)",
        )
        .unwrap();
        let tx = conn.transaction().unwrap();
        tx.execute_batch(MIGRATIONS[0]).unwrap();
        tx.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (1, '2024-01-01T00:00:00Z')",
        [],
        )
        .unwrap();
        tx.commit().unwrap();

        apply_pending(&mut conn).unwrap();

        // v2's index exists and v1 was not re-applied
        let idx: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_tasks_run'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(idx, 1);
    }
}
