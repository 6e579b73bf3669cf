//! Quality-gate reviews
//!
//! Gates use a stricter contract than normal stages: each agent's
//! payload must deserialize into a validated [`GateReview`], not merely
//! yield best-effort text. The gate verdict is a deterministic function
//! of the set of reviews.

use serde::{Deserialize, Serialize};

use crate::core::error::DomainError;

/// Reviewer confidence in a proposed answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Severity of a gate issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueMagnitude {
    Critical,
    Important,
    Minor,
}

/// Whether an issue can be resolved without a human
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolvability {
    AutoFix,
    SuggestFix,
    NeedHuman,
}

/// One issue raised by a gate reviewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateIssue {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub confidence: Confidence,
    pub magnitude: IssueMagnitude,
    pub resolvability: Resolvability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

impl GateIssue {
    /// An issue that must block progression
    pub fn is_blocking(&self) -> bool {
        self.magnitude == IssueMagnitude::Critical
            && self.resolvability != Resolvability::AutoFix
    }
}

/// One agent's structured gate review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReview {
    pub issues: Vec<GateIssue>,
}

impl GateReview {
    /// Strictly parse a payload into a review
    ///
    /// Unlike stage extraction there is no lossy fallback: a payload
    /// that does not match the schema is a malformed review.
    pub fn from_payload(agent: &str, payload: &serde_json::Value) -> Result<Self, DomainError> {
        serde_json::from_value(payload.clone()).map_err(|e| DomainError::MalformedGateReview {
            agent: agent.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn blocking_issues(&self) -> impl Iterator<Item = &GateIssue> {
        self.issues.iter().filter(|i| i.is_blocking())
    }
}

/// Pass/fail decision for a quality gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "verdict")]
pub enum GateVerdict {
    Pass,
    Fail {
        /// Blocking issues aggregated across all reviews, deduplicated
        /// and sorted for determinism
        issues: Vec<GateIssue>,
    },
}

impl GateVerdict {
    /// Decide a gate from the set of parsed reviews
    ///
    /// The gate fails when any blocking issue survives. Issue order in
    /// the verdict is independent of review arrival order.
    pub fn decide(reviews: &[GateReview]) -> GateVerdict {
        let mut blocking: Vec<GateIssue> = reviews
            .iter()
            .flat_map(|r| r.blocking_issues().cloned())
            .collect();
        blocking.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.question.cmp(&b.question)));
        blocking.dedup_by(|a, b| a.id == b.id && a.question == b.question);

        if blocking.is_empty() {
            GateVerdict::Pass
        } else {
            GateVerdict::Fail { issues: blocking }
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, GateVerdict::Pass)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GateVerdict::Pass => "pass",
            GateVerdict::Fail { .. } => "fail",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue(id: &str, magnitude: IssueMagnitude, resolvability: Resolvability) -> GateIssue {
        GateIssue {
            id: id.to_string(),
            question: format!("question {id}"),
            answer: "answer".to_string(),
            confidence: Confidence::High,
            magnitude,
            resolvability,
            suggested_fix: None,
        }
    }

    #[test]
    fn test_strict_parse_rejects_loose_payload() {
        let payload = json!({"content": "free text, no issues array"});
        assert!(GateReview::from_payload("claude", &payload).is_err());
    }

    #[test]
    fn test_strict_parse_accepts_valid_review() {
        let payload = json!({
            "issues": [{
                "id": "Q1",
                "question": "Is the schema versioned?",
                "answer": "Yes, via schema_version",
                "confidence": "high",
                "magnitude": "minor",
                "resolvability": "auto-fix"
            }]
        });
        let review = GateReview::from_payload("claude", &payload).unwrap();
        assert_eq!(review.issues.len(), 1);
        assert!(!review.issues[0].is_blocking());
    }

    #[test]
    fn test_critical_non_autofix_issue_fails_gate() {
        let reviews = vec![GateReview {
            issues: vec![issue("Q1", IssueMagnitude::Critical, Resolvability::NeedHuman)],
        }];
        let verdict = GateVerdict::decide(&reviews);
        assert!(!verdict.passed());
        match verdict {
            GateVerdict::Fail { issues } => assert_eq!(issues[0].id, "Q1"),
            GateVerdict::Pass => panic!("expected fail"),
        }
    }

    #[test]
    fn test_autofixable_critical_issue_passes() {
        let reviews = vec![GateReview {
            issues: vec![issue("Q1", IssueMagnitude::Critical, Resolvability::AutoFix)],
        }];
        assert!(GateVerdict::decide(&reviews).passed());
    }

    #[test]
    fn test_verdict_is_order_independent() {
        let a = GateReview {
            issues: vec![issue("Q2", IssueMagnitude::Critical, Resolvability::NeedHuman)],
        };
        let b = GateReview {
            issues: vec![issue("Q1", IssueMagnitude::Critical, Resolvability::SuggestFix)],
        };
        let forward = GateVerdict::decide(&[a.clone(), b.clone()]);
        let reverse = GateVerdict::decide(&[b, a]);
        assert_eq!(forward, reverse);
    }

    #[test]
    fn test_no_issues_passes() {
        assert!(GateVerdict::decide(&[GateReview { issues: vec![] }]).passed());
    }
}
