//! Agent roster and per-agent outcomes

pub mod outcome;
pub mod roster;

pub use outcome::{AgentOutcome, OutcomeStatus};
pub use roster::{AgentSpec, Roster};
