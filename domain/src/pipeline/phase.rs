//! Run phase state machine
//!
//! A run is always in exactly one phase: a pipeline stage or one of the
//! terminal states. Transitions are strictly linear; a completed stage is
//! never re-entered within the same run. Resuming from an arbitrary stage
//! is done by starting a *new* run for the same specification.

use serde::{Deserialize, Serialize};

use super::stage::Stage;
use crate::core::error::DomainError;

/// Current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    /// Executing (or about to execute) the given stage
    Stage(Stage),
    /// All stages synthesized successfully
    Completed,
    /// Aborted: quorum failure, gate rejection or fatal store error
    Failed,
}

impl RunPhase {
    /// Phase a fresh run starts in
    pub fn initial() -> Self {
        RunPhase::Stage(Stage::Plan)
    }

    /// Whether the run can make further progress
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Failed)
    }

    /// The stage currently being executed, if any
    pub fn stage(self) -> Option<Stage> {
        match self {
            RunPhase::Stage(stage) => Some(stage),
            _ => None,
        }
    }

    /// Phase after the current stage synthesized successfully
    ///
    /// Terminal phases do not advance.
    pub fn advanced(self) -> RunPhase {
        match self {
            RunPhase::Stage(stage) => match stage.next() {
                Some(next) => RunPhase::Stage(next),
                None => RunPhase::Completed,
            },
            terminal => terminal,
        }
    }

    /// Stable name used for storage
    pub fn as_str(self) -> &'static str {
        match self {
            RunPhase::Stage(stage) => stage.as_str(),
            RunPhase::Completed => "completed",
            RunPhase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RunPhase {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" => Ok(RunPhase::Completed),
            "failed" => Ok(RunPhase::Failed),
            other => other
                .parse::<Stage>()
                .map(RunPhase::Stage)
                .map_err(|_| DomainError::InvalidPhase(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_phase_is_plan() {
        assert_eq!(RunPhase::initial(), RunPhase::Stage(Stage::Plan));
    }

    #[test]
    fn test_advancement_walks_all_stages() {
        let mut phase = RunPhase::initial();
        let mut visited = Vec::new();
        while let Some(stage) = phase.stage() {
            visited.push(stage);
            phase = phase.advanced();
        }
        assert_eq!(visited, Stage::all().to_vec());
        assert_eq!(phase, RunPhase::Completed);
    }

    #[test]
    fn test_terminal_phases_do_not_advance() {
        assert_eq!(RunPhase::Completed.advanced(), RunPhase::Completed);
        assert_eq!(RunPhase::Failed.advanced(), RunPhase::Failed);
    }

    #[test]
    fn test_phase_round_trips_through_storage_name() {
        for stage in Stage::all() {
            let phase = RunPhase::Stage(stage);
            assert_eq!(phase.as_str().parse::<RunPhase>().ok(), Some(phase));
        }
        assert_eq!("completed".parse::<RunPhase>().ok(), Some(RunPhase::Completed));
        assert_eq!("failed".parse::<RunPhase>().ok(), Some(RunPhase::Failed));
    }
}
