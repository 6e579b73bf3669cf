//! Evidence export port
//!
//! Mirrors synthesis records into an external audit tree and writes the
//! per-stage deliverable files. Deliverables are overwritten on every
//! successful synthesis; stale content must never survive a re-run.

use conclave_domain::{SpecId, SynthesisRecord};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("Failed to write evidence: {0}")]
    WriteFailed(String),

    #[error("Failed to serialize record: {0}")]
    Serialization(String),
}

/// Sink for synthesis evidence and deliverable files
pub trait EvidenceSink: Send + Sync {
    /// Regenerate the synthesis summary (and verdict, for gates) for a
    /// step in the evidence tree
    fn record_synthesis(
        &self,
        spec_id: &SpecId,
        record: &SynthesisRecord,
    ) -> Result<(), EvidenceError>;

    /// Write the step's deliverable file, replacing any existing content
    fn write_deliverable(
        &self,
        spec_id: &SpecId,
        record: &SynthesisRecord,
    ) -> Result<(), EvidenceError>;
}

/// Sink that discards everything, for tests and dry runs
pub struct NoEvidence;

impl EvidenceSink for NoEvidence {
    fn record_synthesis(
        &self,
        _spec_id: &SpecId,
        _record: &SynthesisRecord,
    ) -> Result<(), EvidenceError> {
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
