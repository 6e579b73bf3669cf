//! Agent roster with alias-insensitive matching
//!
//! Transport layers report agent names inconsistently ("GPT-Pro",
//! "gpt_pro", "gptpro latest"). Each roster slot owns a canonical id plus
//! optional aliases; matching normalizes case and separators so an agent
//! reporting under an alias still fills its slot instead of leaving the
//! coordinator waiting on a name that already answered.

use serde::{Deserialize, Serialize};

/// One logical agent slot in a stage roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Canonical identifier (lowercase, underscores)
    pub id: String,
    /// Alternative transport-level names that satisfy this slot
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl AgentSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: normalize(&id.into()),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(|a| normalize(&a.into())).collect();
        self
    }

    /// Whether a reported name is exactly this slot's id or one of its
    /// aliases, after normalization
    pub fn matches_exactly(&self, reported: &str) -> bool {
        let name = normalize(reported);
        !name.is_empty() && (name == self.id || self.aliases.iter().any(|a| *a == name))
    }

    /// Whether a reported name satisfies this slot
    ///
    /// Matches the canonical id, any alias, or a reported name that starts
    /// with the canonical id (e.g. "claude_sonnet" fills "claude"). Roster
    /// resolution checks exact matches across every slot before any prefix
    /// match, so ids that prefix one another still route correctly.
    pub fn matches(&self, reported: &str) -> bool {
        let name = normalize(reported);
        if name.is_empty() {
            return false;
        }
        if name == self.id || name.starts_with(&self.id) {
            return true;
        }
        self.aliases.iter().any(|a| *a == name || name.starts_with(a.as_str()))
    }

    /// Filename-safe slug for evidence artifacts
    pub fn slug(&self) -> String {
        let slug: String = self
            .id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let trimmed = slug.trim_matches('_');
        if trimmed.is_empty() {
            "agent".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// The fixed set of agents expected to participate in a stage
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Roster {
    pub agents: Vec<AgentSpec>,
}

impl Roster {
    pub fn new(agents: Vec<AgentSpec>) -> Self {
        Self { agents }
    }

    /// Build a roster from bare canonical ids
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            agents: ids.into_iter().map(AgentSpec::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentSpec> {
        self.agents.iter()
    }

    /// Resolve a reported name to its roster slot
    ///
    /// Exact id/alias equality wins over prefix matching, so a roster
    /// holding both "gpt" and "gpt_pro" sends a "gpt_pro" report to the
    /// longer slot instead of the first prefix hit.
    pub fn resolve(&self, reported: &str) -> Option<&AgentSpec> {
        self.slot_index(reported).map(|idx| &self.agents[idx])
    }

    fn slot_index(&self, reported: &str) -> Option<usize> {
        self.agents
            .iter()
            .position(|a| a.matches_exactly(reported))
            .or_else(|| self.agents.iter().position(|a| a.matches(reported)))
    }

    /// Canonical ids with no artifact among the reported names
    pub fn missing<'a, I>(&self, reported: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut present: Vec<bool> = vec![false; self.agents.len()];
        for name in reported {
            if let Some(idx) = self.slot_index(name) {
                present[idx] = true;
            }
        }
        self.agents
            .iter()
            .zip(present)
            .filter(|(_, seen)| !seen)
            .map(|(a, _)| a.id.clone())
            .collect()
    }
}

/// Normalize a transport-level agent name for comparison
fn normalize(name: &str) -> String {
    let lowered: String = name
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' || c == '.' { '_' } else { c })
        .collect();
    lowered.trim_matches('_').to_string()
}
