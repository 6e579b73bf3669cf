//! Consensus machinery: quorum policy, payload extraction, deliverable
//! synthesis and quality-gate reviews

pub mod extraction;
pub mod gate;
pub mod quorum;
pub mod synthesis;

pub use extraction::{extract_payload, extract_stage_payload, Extraction, ExtractionStatus};
pub use gate::{Confidence, GateIssue, GateReview, GateVerdict, IssueMagnitude, Resolvability};
pub use quorum::{QuorumDecision, QuorumPolicy};
pub use synthesis::{collect_consensus_lists, compose_deliverable};
