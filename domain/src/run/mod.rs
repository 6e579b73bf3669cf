//! Run entities: runs, agent tasks, artifacts and synthesis records

pub mod entities;

pub use entities::{
    AgentTask, ConsensusArtifact, Run, RunId, RunStatus, SpecId, SynthesisRecord, TaskStatus,
};
