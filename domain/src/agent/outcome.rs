//! Per-agent stage outcomes

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Terminal status of one agent invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Completed,
    TimedOut,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeStatus::Completed => "completed",
            OutcomeStatus::TimedOut => "timed_out",
            OutcomeStatus::Failed => "failed",
        }
    }
}

/// Result of one agent's participation in a stage
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    /// Canonical roster id
    pub agent_id: String,
    pub status: OutcomeStatus,
    /// Raw transport output; `None` on timeout or failure
    pub raw_output: Option<String>,
    pub duration: Duration,
}

impl AgentOutcome {
    pub fn completed(agent_id: impl Into<String>, raw: impl Into<String>, duration: Duration) -> Self {
        Self {
            agent_id: agent_id.into(),
            status: OutcomeStatus::Completed,
            raw_output: Some(raw.into()),
            duration,
        }
    }

    pub fn timed_out(agent_id: impl Into<String>, duration: Duration) -> Self {
        Self {
            agent_id: agent_id.into(),
            status: OutcomeStatus::TimedOut,
            raw_output: None,
            duration,
        }
    }

    pub fn failed(agent_id: impl Into<String>, duration: Duration) -> Self {
        Self {
            agent_id: agent_id.into(),
            status: OutcomeStatus::Failed,
            raw_output: None,
            duration,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == OutcomeStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_outcome_carries_output() {
        let outcome = AgentOutcome::completed("claude", "text", Duration::from_secs(1));
        assert!(outcome.is_completed());
        assert_eq!(outcome.raw_output.as_deref(), Some("text"));
    }

    #[test]
    fn test_timed_out_outcome_has_no_output() {
        let outcome = AgentOutcome::timed_out("gemini", Duration::from_secs(30));
        assert!(!outcome.is_completed());
        assert!(outcome.raw_output.is_none());
    }
}
