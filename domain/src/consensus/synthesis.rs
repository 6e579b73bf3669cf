//! Deliverable composition from a set of consensus artifacts
//!
//! The output is a deterministic function of the *set* of usable
//! artifacts: artifacts are ordered by canonical agent id before
//! rendering, so arrival order never changes the deliverable.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::pipeline::stage::PipelineStep;
use crate::run::entities::{ConsensusArtifact, SpecId};

/// Compose the step deliverable (markdown) from usable artifacts
///
/// `missing_agents` and `degraded` come from the quorum decision and are
/// surfaced in the consensus summary trailer.
pub fn compose_deliverable(
    spec_id: &SpecId,
    step: PipelineStep,
    artifacts: &[ConsensusArtifact],
    missing_agents: &[String],
    degraded: bool,
    generated_at: DateTime<Utc>,
) -> String {
    let mut ordered: Vec<&ConsensusArtifact> =
        artifacts.iter().filter(|a| a.is_usable()).collect();
    ordered.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));

    let mut out = String::new();
    out.push_str(&format!("# {}: {}\n\n", step.display_name(), spec_id));
    out.push_str(&format!("**Stage**: {}\n", step.display_name()));
    out.push_str(&format!("**Agents**: {}\n", ordered.len()));
    out.push_str(&format!(
        "**Generated**: {}\n\n",
        generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    let mut rendered_any = false;
    for artifact in &ordered {
        rendered_any |= render_agent_section(&mut out, &artifact.agent_id, &artifact.payload);
    }

    // Nothing recognized anywhere: fall back to raw payload dumps
    if !rendered_any {
        out.push_str("## Agent Responses (Raw)\n\n");
        for artifact in &ordered {
            out.push_str(&format!("### {}\n\n", artifact.agent_id));
            out.push_str(&format!(
                "```json\n{}\n```\n\n",
                serde_json::to_string_pretty(&artifact.payload)
                    .unwrap_or_else(|_| artifact.payload.to_string())
            ));
        }
    }

    let (agreements, conflicts) = collect_consensus_lists(&ordered);

    out.push_str("## Consensus Summary\n\n");
    out.push_str(&format!(
        "- Synthesized from {} agent response(s)\n",
        ordered.len()
    ));
    if degraded {
        out.push_str("- Degraded: quorum met without the full roster\n");
    }
    if !missing_agents.is_empty() {
        out.push_str(&format!("- Missing agents: {}\n", missing_agents.join(", ")));
    }
    if !agreements.is_empty() {
        out.push_str(&format!("- Agreements: {}\n", agreements.join("; ")));
    }
    if !conflicts.is_empty() {
        out.push_str(&format!("- Conflicts: {}\n", conflicts.join("; ")));
    }
    out
}

/// Merge `consensus.agreements` / `consensus.conflicts` lists across
/// artifacts, sorted and deduplicated
pub fn collect_consensus_lists(artifacts: &[&ConsensusArtifact]) -> (Vec<String>, Vec<String>) {
    let mut agreements = Vec::new();
    let mut conflicts = Vec::new();
    for artifact in artifacts {
        let node = artifact.payload.get("consensus");
        if let Some(node) = node {
            agreements.extend(string_list(node.get("agreements")));
            conflicts.extend(string_list(node.get("conflicts")));
        }
    }
    agreements.sort_unstable();
    agreements.dedup();
    conflicts.sort_unstable();
    conflicts.dedup();
    (agreements, conflicts)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Render the recognized sections of one agent's payload
///
/// Returns whether anything was rendered.
fn render_agent_section(out: &mut String, agent: &str, payload: &Value) -> bool {
    let mut rendered = false;

    if let Some(steps) = payload.get("work_breakdown").and_then(|v| v.as_array()) {
        out.push_str(&format!("## Work Breakdown (from {})\n\n", agent));
        for (i, step) in steps.iter().enumerate() {
            if let Some(name) = step.get("step").and_then(|v| v.as_str()) {
                out.push_str(&format!("{}. {}\n", i + 1, name));
                if let Some(rationale) = step.get("rationale").and_then(|v| v.as_str()) {
                    out.push_str(&format!("   - Rationale: {}\n", rationale));
                }
            }
        }
        out.push('\n');
        rendered = true;
    }

    if let Some(tasks) = payload.get("tasks").and_then(|v| v.as_array()) {
        out.push_str(&format!("## Tasks (from {})\n\n", agent));
        for task in tasks {
            if let Some(text) = task.as_str() {
                out.push_str(&format!("- {}\n", text));
            } else if let Some(obj) = task.as_object() {
                let name = obj
                    .get("name")
                    .or_else(|| obj.get("task"))
                    .and_then(|v| v.as_str());
                if let Some(name) = name {
                    out.push_str(&format!("- {}\n", name));
                    if let Some(desc) = obj.get("description").and_then(|v| v.as_str()) {
                        out.push_str(&format!("  - {}\n", desc));
                    }
                }
            }
        }
        out.push('\n');
        rendered = true;
    }

    if let Some(risks) = payload.get("risks").and_then(|v| v.as_array()) {
        out.push_str(&format!("## Risks (from {})\n\n", agent));
        for risk in risks {
            if let Some(desc) = risk.get("risk").and_then(|v| v.as_str()) {
                out.push_str(&format!("- **Risk**: {}\n", desc));
                if let Some(mitigation) = risk.get("mitigation").and_then(|v| v.as_str()) {
                    out.push_str(&format!("  - Mitigation: {}\n", mitigation));
                }
            }
        }
        out.push('\n');
        rendered = true;
    }

    if let Some(content) = payload.get("content").and_then(|v| v.as_str()) {
        if !content.is_empty() {
            out.push_str(&format!("## Response from {}\n\n", agent));
            out.push_str(content);
            out.push_str("\n\n");
            rendered = true;
        }
    }

    rendered
}
