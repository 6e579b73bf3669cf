//! Configuration file schema
//!
//! Everything a run needs that is not per-invocation: agent roster,
//! execution knobs, gate placement and adapter paths. String-typed
//! fields (quorum, stage names) are validated when converted into the
//! application types, not at deserialization time, so a config error
//! names the offending value.

use std::collections::BTreeMap;
use std::time::Duration;

use conclave_application::{ExecutionParams, PipelinePlan};
use conclave_domain::{AgentSpec, ExecutionMode, QualityGate, QuorumPolicy, Roster, Stage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

/// Top-level configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// SQLite store file
    pub store_path: String,
    /// Root of the evidence tree
    pub evidence_dir: String,
    /// Optional playbook directory for prompt context
    pub playbook_dir: Option<String>,
    pub agents: Vec<AgentConfig>,
    pub execution: ExecutionConfig,
    /// Gates placed ahead of a stage, keyed by stage name
    pub gates: BTreeMap<String, Vec<String>>,
    /// Per-stage scheduling overrides, keyed by stage name
    pub modes: BTreeMap<String, ExecutionMode>,
    pub transport: TransportConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            store_path: "conclave.db".to_string(),
            evidence_dir: "evidence".to_string(),
            playbook_dir: None,
            agents: Vec::new(),
            execution: ExecutionConfig::default(),
            gates: BTreeMap::new(),
            modes: BTreeMap::new(),
            transport: TransportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub step_timeout_secs: u64,
    pub mode: ExecutionMode,
    /// Quorum policy: "two-thirds", "majority", "full" or "N%"
    pub quorum: String,
    pub gate_max_retries: usize,
    pub stage_max_retries: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: 300,
            mode: ExecutionMode::Parallel,
            quorum: "two-thirds".to_string(),
            gate_max_retries: 1,
            stage_max_retries: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Program invoked per agent; the prompt is written to its stdin
    pub command: String,
    /// Arguments; `{agent}` is replaced by the agent id
    pub args: Vec<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            command: "copilot-agent".to_string(),
            args: vec!["--model".to_string(), "{agent}".to_string()],
        }
    }
}

impl FileConfig {
    pub fn roster(&self) -> Roster {
        Roster::new(
            self.agents
                .iter()
                .map(|a| AgentSpec::new(&a.id).with_aliases(a.aliases.iter().cloned()))
                .collect(),
        )
    }

    pub fn execution_params(&self) -> Result<ExecutionParams, ConfigError> {
        let quorum: QuorumPolicy = self
            .execution
            .quorum
            .parse()
            .map_err(ConfigError::Invalid)?;
        Ok(ExecutionParams::default()
            .with_step_timeout(Duration::from_secs(self.execution.step_timeout_secs))
            .with_mode(self.execution.mode)
            .with_quorum(quorum)
            .with_gate_max_retries(self.execution.gate_max_retries)
            .with_stage_max_retries(self.execution.stage_max_retries))
    }

    pub fn pipeline_plan(&self) -> Result<PipelinePlan, ConfigError> {
        let mut plan = PipelinePlan::new(self.roster());

        for (stage_name, gate_names) in &self.gates {
            let stage: Stage = stage_name
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("unknown stage: {stage_name}")))?;
            for gate_name in gate_names {
                let gate: QualityGate = gate_name
                    .parse()
                    .map_err(|_| ConfigError::Invalid(format!("unknown gate: {gate_name}")))?;
                plan = plan.with_gate(stage, gate);
            }
        }

        for (stage_name, mode) in &self.modes {
            let stage: Stage = stage_name
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("unknown stage: {stage_name}")))?;
            plan = plan.with_mode_override(stage, *mode);
        }

        Ok(plan)
    }
}
