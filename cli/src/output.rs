//! Console rendering of the status view

use conclave_application::RunStatusView;

pub fn format_status(view: &RunStatusView) -> String {
    let mut out = String::new();

    out.push_str(&format!("Run:    {}\n", view.run.id));
    out.push_str(&format!("Spec:   {}\n", view.run.spec_id));
    out.push_str(&format!("Phase:  {}\n", view.run.phase));
    out.push_str(&format!("Status: {}\n", view.run.status.as_str()));
    out.push_str(&format!(
        "Tasks:  {} total, {} completed, {} timed out, {} failed\n",
        view.tasks_total, view.tasks_completed, view.tasks_timed_out, view.tasks_failed
    ));
    out.push('\n');

    for stage in &view.stages {
        let marker = if stage.synthesized {
            if stage.degraded {
                "[~]"
            } else {
                "[x]"
            }
        } else {
            "[ ]"
        };
        out.push_str(&format!(
            "{marker} {:<10} {} artifact(s)",
            stage.stage.display_name(),
            stage.artifact_count
        ));
        if let Some(verdict) = &stage.verdict {
            out.push_str(&format!("  verdict: {}", verdict.as_str()));
        }
        out.push('\n');
    }

    out
}

pub fn format_status_json(view: &RunStatusView) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(view)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use conclave_application::use_cases::status::StageStatus;
    use conclave_domain::{Run, RunId, RunPhase, RunStatus, SpecId, Stage};

    fn view() -> RunStatusView {
        RunStatusView {
            run: Run {
                id: RunId("SPEC-1_1_aa".into()),
                spec_id: SpecId::from("SPEC-1"),
                phase: RunPhase::Stage(Stage::Tasks),
                status: RunStatus::InProgress,
                created_at: Utc::now(),
            },
            stages: vec![
                StageStatus {
                    stage: Stage::Plan,
                    synthesized: true,
                    degraded: true,
                    artifact_count: 2,
                    verdict: None,
                },
                StageStatus {
                    stage: Stage::Tasks,
                    synthesized: false,
                    degraded: false,
                    artifact_count: 0,
                    verdict: None,
                },
            ],
            tasks_total: 3,
            tasks_completed: 2,
            tasks_timed_out: 1,
            tasks_failed: 0,
        }
    }

    #[test]
    fn test_degraded_stage_is_marked() {
        let text = format_status(&view());
        assert!(text.contains("[~] Plan"));
        assert!(text.contains("[ ] Tasks"));
        assert!(text.contains("1 timed out"));
    }

    #[test]
    fn test_json_output_is_parseable() {
        let json = format_status_json(&view()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["run"]["spec_id"], "SPEC-1");
        assert_eq!(parsed["tasks_total"], 3);
    }
}
