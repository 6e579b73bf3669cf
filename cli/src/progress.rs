//! Console progress reporting

use conclave_application::ProgressNotifier;
use conclave_domain::{OutcomeStatus, PipelineStep, QualityGate, RunPhase};

/// Prints one line per pipeline event
pub struct ConsoleProgress;

impl ProgressNotifier for ConsoleProgress {
    fn on_step_start(&self, step: PipelineStep, agent_count: usize) {
        let kind = if step.is_gate() { "gate" } else { "stage" };
        println!("==> {} {} ({} agents)", kind, step.display_name(), agent_count);
    }

    fn on_agent_complete(&self, _step: PipelineStep, agent_id: &str, status: OutcomeStatus) {
        let mark = match status {
            OutcomeStatus::Completed => "ok",
            OutcomeStatus::TimedOut => "timeout",
            OutcomeStatus::Failed => "failed",
        };
        println!("    {agent_id}: {mark}");
    }

    fn on_synthesis(&self, step: PipelineStep, degraded: bool) {
        if degraded {
            println!("    {} synthesized (degraded)", step.display_name());
        } else {
            println!("    {} synthesized", step.display_name());
        }
    }

    fn on_gate_verdict(&self, gate: QualityGate, passed: bool) {
        let verdict = if passed { "PASS" } else { "FAIL" };
        println!("    gate {}: {verdict}", gate.display_name());
    }

    fn on_phase_advance(&self, phase: &RunPhase) {
        println!("--> phase: {phase}");
    }
}
