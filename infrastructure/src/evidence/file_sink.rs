//! Filesystem evidence tree
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/<spec_id>/<step>.md                       deliverables
//! <root>/consensus/<spec_id>/<step>_synthesis.json summaries
//! <root>/consensus/<spec_id>/<step>_verdict.json   gate verdicts
//! ```
//!
//! Every file is rewritten whole on each synthesis. Deliverables in
//! particular are replaced unconditionally so a re-run never ships a
//! stale earlier version.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use conclave_application::{EvidenceError, EvidenceSink};
use conclave_domain::{GateVerdict, SpecId, SynthesisRecord};
use serde::Serialize;
use tracing::debug;

pub struct FileEvidenceSink {
    root: PathBuf,
}

/// Synthesis summary as written to the evidence tree
#[derive(Serialize)]
struct SynthesisSummary<'a> {
    run_id: &'a str,
    spec_id: &'a str,
    step: &'a str,
    artifact_count: usize,
    quorum_required: usize,
    degraded: bool,
    agreements: &'a [String],
    conflicts: &'a [String],
    missing_agents: &'a [String],
    created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct VerdictSummary<'a> {
    run_id: &'a str,
    step: &'a str,
    verdict: &'a GateVerdict,
    created_at: DateTime<Utc>,
}

impl FileEvidenceSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn deliverable_path(&self, spec_id: &SpecId, record: &SynthesisRecord) -> PathBuf {
        self.root
            .join(spec_id.as_str())
            .join(format!("{}.md", record.step.as_str()))
    }

    fn consensus_dir(&self, spec_id: &SpecId) -> PathBuf {
        self.root.join("consensus").join(spec_id.as_str())
    }

    fn write_file(path: &Path, contents: &str) -> Result<(), EvidenceError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EvidenceError::WriteFailed(format!("{}: {e}", parent.display())))?;
        }
        fs::write(path, contents)
            .map_err(|e| EvidenceError::WriteFailed(format!("{}: {e}", path.display())))
    }
}

impl EvidenceSink for FileEvidenceSink {
    fn record_synthesis(
        &self,
        spec_id: &SpecId,
        record: &SynthesisRecord,
    ) -> Result<(), EvidenceError> {
        let dir = self.consensus_dir(spec_id);
        let summary = SynthesisSummary {
            run_id: record.run_id.as_str(),
            spec_id: spec_id.as_str(),
            step: record.step.as_str(),
            artifact_count: record.artifact_count,
            quorum_required: record.quorum_required,
            degraded: record.degraded,
            agreements: &record.agreements,
            conflicts: &record.conflicts,
            missing_agents: &record.missing_agents,
            created_at: record.created_at,
        };
        let json = serde_json::to_string_pretty(&summary)
            .map_err(|e| EvidenceError::Serialization(e.to_string()))?;
        Self::write_file(
            &dir.join(format!("{}_synthesis.json", record.step.as_str())),
            &json,
        )?;

        if let Some(verdict) = &record.verdict {
            let verdict_json = serde_json::to_string_pretty(&VerdictSummary {
                run_id: record.run_id.as_str(),
                step: record.step.as_str(),
                verdict,
                created_at: record.created_at,
            })
            .map_err(|e| EvidenceError::Serialization(e.to_string()))?;
            Self::write_file(
                &dir.join(format!("{}_verdict.json", record.step.as_str())),
                &verdict_json,
            )?;
        }

        debug!(spec = %spec_id, step = %record.step, "recorded synthesis evidence");
        Ok(())
    }

    fn write_deliverable(
        &self,
        spec_id: &SpecId,
        record: &SynthesisRecord,
    ) -> Result<(), EvidenceError> {
        let path = self.deliverable_path(spec_id, record);
        Self::write_file(&path, &record.deliverable)?;
        debug!(path = %path.display(), "wrote deliverable");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::{PipelineStep, QualityGate, RunId, Stage};

    fn record(step: PipelineStep, deliverable: &str) -> SynthesisRecord {
        SynthesisRecord {
            run_id: RunId("r1".into()),
            step,
            artifact_count: 3,
            quorum_required: 2,
            degraded: false,
            verdict: None,
            deliverable: deliverable.to_string(),
            agreements: vec!["shared point".into()],
            conflicts: vec![],
            missing_agents: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_deliverable_lands_under_spec_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileEvidenceSink::new(dir.path());
        let spec = SpecId::from("SPEC-9");

        sink.write_deliverable(&spec, &record(Stage::Plan.into(), "the plan"))
            .unwrap();

        let written = fs::read_to_string(dir.path().join("SPEC-9/plan.md")).unwrap();
        assert_eq!(written, "the plan");
    }

    #[test]
    fn test_second_synthesis_replaces_deliverable_content() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileEvidenceSink::new(dir.path());
        let spec = SpecId::from("SPEC-9");

        sink.write_deliverable(&spec, &record(Stage::Plan.into(), "first version"))
            .unwrap();
        sink.write_deliverable(&spec, &record(Stage::Plan.into(), "second version"))
            .unwrap();

        let written = fs::read_to_string(dir.path().join("SPEC-9/plan.md")).unwrap();
        assert_eq!(written, "second version");
    }

    #[test]
    fn test_synthesis_summary_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileEvidenceSink::new(dir.path());
        let spec = SpecId::from("SPEC-9");

        sink.record_synthesis(&spec, &record(Stage::Tasks.into(), "ignored"))
            .unwrap();

        let raw =
            fs::read_to_string(dir.path().join("consensus/SPEC-9/tasks_synthesis.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["artifact_count"], 3);
        assert_eq!(parsed["agreements"][0], "shared point");
        assert!(parsed.get("deliverable").is_none());
    }

    #[test]
    fn test_gate_record_also_writes_verdict_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileEvidenceSink::new(dir.path());
        let spec = SpecId::from("SPEC-9");

        let mut rec = record(QualityGate::Analyze.into(), "gate notes");
        rec.verdict = Some(GateVerdict::Pass);
        sink.record_synthesis(&spec, &rec).unwrap();

        let raw =
            fs::read_to_string(dir.path().join("consensus/SPEC-9/analyze_verdict.json")).unwrap();
        assert!(raw.contains("pass"));
    }
}
