//! Agent transport port
//!
//! The coordinator only needs one thing from the outside world: a way to
//! hand a prompt to a named agent and get its raw text back. How the
//! agent runs (subprocess, HTTP, test stub) is an adapter concern.

use async_trait::async_trait;
use conclave_domain::{AgentSpec, PipelineStep, RunId, SpecId};
use thiserror::Error;

/// Errors that can occur while invoking an agent
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to spawn agent '{agent}': {reason}")]
    SpawnFailed { agent: String, reason: String },

    #[error("Agent '{agent}' exited with status {code}: {stderr}")]
    NonZeroExit {
        agent: String,
        code: i32,
        stderr: String,
    },

    #[error("I/O error talking to agent '{agent}': {reason}")]
    Io { agent: String, reason: String },

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Prompt delivered to one agent for one step
#[derive(Debug, Clone)]
pub struct AgentPrompt {
    pub run_id: RunId,
    pub spec_id: SpecId,
    pub step: PipelineStep,
    /// The step's instruction body
    pub body: String,
    /// Pre-fetched context, merged ahead of the body when present
    pub context: Option<String>,
}

impl AgentPrompt {
    pub fn new(run_id: RunId, spec_id: SpecId, step: PipelineStep, body: impl Into<String>) -> Self {
        Self {
            run_id,
            spec_id,
            step,
            body: body.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    /// Final text handed to the transport
    pub fn rendered(&self) -> String {
        match &self.context {
            Some(context) if !context.is_empty() => {
                format!("## Context\n\n{}\n\n{}", context, self.body)
            }
            _ => self.body.clone(),
        }
    }
}

/// Transport for agent invocation
///
/// Timeouts are owned by the caller; an implementation blocks until the
/// agent produces output or fails.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Invoke one agent and return its raw output text
    async fn invoke(&self, agent: &AgentSpec, prompt: &AgentPrompt) -> Result<String, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::Stage;

    #[test]
    fn test_prompt_rendering_merges_context_first() {
        let prompt = AgentPrompt::new(
            RunId("r1".into()),
            SpecId::from("SPEC-1"),
            Stage::Plan.into(),
            "Produce a plan.",
        )
        .with_context(Some("prior decisions".into()));

        let rendered = prompt.rendered();
        let context_pos = rendered.find("prior decisions").unwrap();
        let body_pos = rendered.find("Produce a plan.").unwrap();
        assert!(context_pos < body_pos);
    }

    #[test]
    fn test_prompt_without_context_is_just_body() {
        let prompt = AgentPrompt::new(
            RunId("r1".into()),
            SpecId::from("SPEC-1"),
            Stage::Plan.into(),
            "Produce a plan.",
        );
        assert_eq!(prompt.rendered(), "Produce a plan.");
    }
}
