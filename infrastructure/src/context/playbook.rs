//! Playbook-backed context source
//!
//! Reads optional per-spec, per-step markdown notes from a playbook
//! directory and injects them into agent prompts. A missing file means
//! no context, not an error; only a file that exists but cannot be read
//! surfaces as a failure, and the pipeline treats even that as
//! non-fatal.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use conclave_application::{ContextError, ContextSource};
use conclave_domain::{PipelineStep, SpecId};
use tracing::debug;

pub struct PlaybookContextSource {
    root: PathBuf,
}

impl PlaybookContextSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, spec_id: &SpecId, step: PipelineStep) -> PathBuf {
        self.root
            .join(spec_id.as_str())
            .join(format!("{}.md", step.as_str()))
    }
}

#[async_trait]
impl ContextSource for PlaybookContextSource {
    async fn fetch(
        &self,
        spec_id: &SpecId,
        step: PipelineStep,
    ) -> Result<Option<String>, ContextError> {
        let path = self.path_for(spec_id, step);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                debug!(path = %path.display(), bytes = trimmed.len(), "loaded playbook context");
                Ok(Some(trimmed.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ContextError::ReadFailed(format!(
                "{}: {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::Stage;

    #[tokio::test]
    async fn test_existing_note_is_returned_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let spec_dir = dir.path().join("SPEC-1");
        std::fs::create_dir_all(&spec_dir).unwrap();
        std::fs::write(spec_dir.join("plan.md"), "  use the staging cluster  \n").unwrap();

        let source = PlaybookContextSource::new(dir.path());
        let context = source
            .fetch(&SpecId::from("SPEC-1"), Stage::Plan.into())
            .await
            .unwrap();
        assert_eq!(context.as_deref(), Some("use the staging cluster"));
    }

    #[tokio::test]
    async fn test_missing_note_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = PlaybookContextSource::new(dir.path());
        let context = source
            .fetch(&SpecId::from("SPEC-1"), Stage::Tasks.into())
            .await
            .unwrap();
        assert!(context.is_none());
    }

    #[tokio::test]
    async fn test_blank_note_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let spec_dir = dir.path().join("SPEC-1");
        std::fs::create_dir_all(&spec_dir).unwrap();
        std::fs::write(spec_dir.join("plan.md"), "   \n\n").unwrap();

        let source = PlaybookContextSource::new(dir.path());
        let context = source
            .fetch(&SpecId::from("SPEC-1"), Stage::Plan.into())
            .await
            .unwrap();
        assert!(context.is_none());
    }
}
