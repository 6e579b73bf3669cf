//! Quorum policy for consensus synthesis
//!
//! The quorum fraction is a policy value, not a constant. The default is
//! two-thirds of the roster: synthesis proceeds degraded when at least
//! `ceil(2R/3)` usable artifacts exist, and non-degraded only with the
//! full roster.

use serde::{Deserialize, Serialize};

/// Rule deciding how many usable artifacts a stage needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QuorumPolicy {
    /// At least ceil(2R/3) artifacts (default)
    #[default]
    TwoThirds,

    /// More than half of the roster
    Majority,

    /// At least this percentage of the roster (0-100)
    Percentage(u8),

    /// Every roster slot must produce a usable artifact
    Full,
}

impl QuorumPolicy {
    /// Minimum usable artifacts required for a roster of `total`
    pub fn required(&self, total: usize) -> usize {
        match self {
            QuorumPolicy::TwoThirds => (2 * total).div_ceil(3),
            QuorumPolicy::Majority => total / 2 + 1,
            QuorumPolicy::Percentage(p) => {
                ((total as f64) * (*p as f64 / 100.0)).ceil() as usize
            }
            QuorumPolicy::Full => total,
        }
    }

    /// Judge a stage's usable-artifact count against the roster size
    pub fn decide(&self, total: usize, usable: usize) -> QuorumDecision {
        if total == 0 {
            return QuorumDecision::NotMet { usable, required: 0 };
        }
        let required = self.required(total);
        if usable < required {
            QuorumDecision::NotMet { usable, required }
        } else if usable < total {
            QuorumDecision::Degraded { usable, required }
        } else {
            QuorumDecision::Met { usable, required }
        }
    }

    pub fn description(&self) -> String {
        match self {
            QuorumPolicy::TwoThirds => "two-thirds of the roster".to_string(),
            QuorumPolicy::Majority => "more than half of the roster".to_string(),
            QuorumPolicy::Percentage(p) => format!("at least {}% of the roster", p),
            QuorumPolicy::Full => "the full roster".to_string(),
        }
    }
}

impl std::fmt::Display for QuorumPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::str::FromStr for QuorumPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two-thirds" | "two_thirds" | "2/3" => Ok(QuorumPolicy::TwoThirds),
            "majority" => Ok(QuorumPolicy::Majority),
            "full" | "unanimous" => Ok(QuorumPolicy::Full),
            s if s.starts_with("percentage:") || s.ends_with('%') => {
                let num = s.trim_start_matches("percentage:").trim_end_matches('%');
                let p: u8 = num.parse().map_err(|_| "Invalid percentage".to_string())?;
                Ok(QuorumPolicy::Percentage(p))
            }
            other => Err(format!(
                "Unknown quorum policy: {}. Valid: two-thirds, majority, full, percentage:N or N%",
                other
            )),
        }
    }
}

/// Outcome of a quorum check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuorumDecision {
    /// Full roster produced usable artifacts
    Met { usable: usize, required: usize },
    /// Quorum reached with fewer than the full roster
    Degraded { usable: usize, required: usize },
    /// Below quorum: no synthesis record may be produced
    NotMet { usable: usize, required: usize },
}

impl QuorumDecision {
    pub fn is_met(&self) -> bool {
        !matches!(self, QuorumDecision::NotMet { .. })
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, QuorumDecision::Degraded { .. })
    }

    pub fn required(&self) -> usize {
        match self {
            QuorumDecision::Met { required, .. }
            | QuorumDecision::Degraded { required, .. }
            | QuorumDecision::NotMet { required, .. } => *required,
        }
    }

    pub fn usable(&self) -> usize {
        match self {
            QuorumDecision::Met { usable, .. }
            | QuorumDecision::Degraded { usable, .. }
            | QuorumDecision::NotMet { usable, .. } => *usable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_thirds_threshold_roster_of_three() {
        assert_eq!(QuorumPolicy::TwoThirds.required(3), 2);
        assert_eq!(QuorumPolicy::TwoThirds.required(4), 3);
        assert_eq!(QuorumPolicy::TwoThirds.required(5), 4);
        assert_eq!(QuorumPolicy::TwoThirds.required(6), 4);
    }

    #[test]
    fn test_roster_three_with_two_artifacts_is_degraded() {
        let decision = QuorumPolicy::TwoThirds.decide(3, 2);
        assert!(decision.is_met());
        assert!(decision.is_degraded());
        assert_eq!(decision.required(), 2);
    }

    #[test]
    fn test_roster_three_with_one_artifact_fails() {
        let decision = QuorumPolicy::TwoThirds.decide(3, 1);
        assert!(!decision.is_met());
    }

    #[test]
    fn test_full_roster_is_not_degraded() {
        let decision = QuorumPolicy::TwoThirds.decide(3, 3);
        assert!(decision.is_met());
        assert!(!decision.is_degraded());
    }

    #[test]
    fn test_empty_roster_never_meets_quorum() {
        assert!(!QuorumPolicy::TwoThirds.decide(0, 0).is_met());
        assert!(!QuorumPolicy::Full.decide(0, 0).is_met());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("two-thirds".parse::<QuorumPolicy>().ok(), Some(QuorumPolicy::TwoThirds));
        assert_eq!("majority".parse::<QuorumPolicy>().ok(), Some(QuorumPolicy::Majority));
        assert_eq!("90%".parse::<QuorumPolicy>().ok(), Some(QuorumPolicy::Percentage(90)));
        assert_eq!(
            "percentage:75".parse::<QuorumPolicy>().ok(),
            Some(QuorumPolicy::Percentage(75))
        );
        assert!("half".parse::<QuorumPolicy>().is_err());
    }

    #[test]
    fn test_percentage_rounds_up() {
        assert_eq!(QuorumPolicy::Percentage(75).required(5), 4);
        assert_eq!(QuorumPolicy::Percentage(90).required(3), 3);
    }
}
