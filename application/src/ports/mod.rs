//! Port definitions
//!
//! Interfaces the use cases depend on. Adapters live in the
//! infrastructure layer.

pub mod agent_transport;
pub mod context_source;
pub mod evidence_sink;
pub mod progress;
pub mod run_store;

pub use agent_transport::{AgentPrompt, AgentTransport, TransportError};
pub use context_source::{ContextError, ContextSource, NoContext};
pub use evidence_sink::{EvidenceError, EvidenceSink, NoEvidence};
pub use progress::{NoProgress, ProgressNotifier};
pub use run_store::{RunStore, StoreError};
