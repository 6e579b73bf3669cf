//! Subprocess agent transport
//!
//! Each invocation spawns the configured command, substitutes the agent
//! id into its arguments, writes the rendered prompt to stdin and
//! captures stdout as the raw output. Timeouts are owned by the
//! coordinator; this adapter blocks until the process exits.

use async_trait::async_trait;
use conclave_application::{AgentPrompt, AgentTransport, TransportError};
use conclave_domain::AgentSpec;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Cap on captured output, 1 MB
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Placeholder in argument templates replaced by the agent's id
const AGENT_PLACEHOLDER: &str = "{agent}";

pub struct CommandTransport {
    program: String,
    args: Vec<String>,
}

impl CommandTransport {
    /// `args` may contain `{agent}`, replaced per invocation
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn resolved_args(&self, agent: &AgentSpec) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace(AGENT_PLACEHOLDER, &agent.id))
            .collect()
    }
}

#[async_trait]
impl AgentTransport for CommandTransport {
    async fn invoke(
        &self,
        agent: &AgentSpec,
        prompt: &AgentPrompt,
    ) -> Result<String, TransportError> {
        let args = self.resolved_args(agent);
        debug!(agent = %agent.id, program = %self.program, "invoking agent process");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransportError::SpawnFailed {
                agent: agent.id.clone(),
                reason: e.to_string(),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.rendered().as_bytes())
                .await
                .map_err(|e| TransportError::Io {
                    agent: agent.id.clone(),
                    reason: e.to_string(),
                })?;
            // Close stdin so the agent sees EOF
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TransportError::Io {
                agent: agent.id.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(TransportError::NonZeroExit {
                agent: agent.id.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.len() > MAX_OUTPUT_SIZE {
            let mut cut = MAX_OUTPUT_SIZE;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::{RunId, SpecId, Stage};

    fn prompt(body: &str) -> AgentPrompt {
        AgentPrompt::new(
            RunId("r1".into()),
            SpecId::from("SPEC-1"),
            Stage::Plan.into(),
            body,
        )
    }

    #[tokio::test]
    async fn test_prompt_flows_through_stdin_to_stdout() {
        let transport = CommandTransport::new("cat", vec![]);
        let output = transport
            .invoke(&AgentSpec::new("claude"), &prompt("hello agent"))
            .await
            .unwrap();
        assert_eq!(output, "hello agent");
    }

    #[tokio::test]
    async fn test_agent_placeholder_is_substituted() {
        let transport = CommandTransport::new("echo", vec!["-n".into(), "{agent}".into()]);
        let output = transport
            .invoke(&AgentSpec::new("gemini"), &prompt(""))
            .await
            .unwrap();
        assert_eq!(output, "gemini");
    }

    #[tokio::test]
    async fn test_nonzero_exit_surfaces_stderr() {
        let transport = CommandTransport::new(
            "sh",
            vec!["-c".into(), "echo broken >&2; exit 3".into()],
        );
        let err = transport
            .invoke(&AgentSpec::new("claude"), &prompt("x"))
            .await
            .unwrap_err();
        match err {
            TransportError::NonZeroExit { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert!(stderr.contains("broken"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let transport = CommandTransport::new("definitely-not-a-real-binary", vec![]);
        let err = transport
            .invoke(&AgentSpec::new("claude"), &prompt("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::SpawnFailed { .. }));
    }
}
