//! Context injection port
//!
//! Optional pre-fetch of historical hints merged into agent prompts.
//! Failure here must degrade gracefully: the pipeline proceeds without
//! extra context and never blocks a stage on this port.

use async_trait::async_trait;
use conclave_domain::{PipelineStep, SpecId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Context source unavailable: {0}")]
    Unavailable(String),

    #[error("Context read failed: {0}")]
    ReadFailed(String),
}

/// Supplier of per-step prompt context
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// Fetch context for a step; `Ok(None)` means nothing relevant exists
    async fn fetch(&self, spec_id: &SpecId, step: PipelineStep)
        -> Result<Option<String>, ContextError>;
}

/// Context source that never supplies anything
pub struct NoContext;

#[async_trait]
impl ContextSource for NoContext {
    async fn fetch(
        &self,
        _spec_id: &SpecId,
        _step: PipelineStep,
    ) -> Result<Option<String>, ContextError> {
        Ok(None)
    }
}
