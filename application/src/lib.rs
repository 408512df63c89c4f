//! Application layer for llm-council
//!
//! Defines the ports the orchestration depends on ([`ModelClient`],
//! [`ConversationStore`]), the [`ModelRegistry`], the bounded event
//! multiplexer, and the [`RunCouncilUseCase`] that drives a full
//! three-stage deliberation.

pub mod config;
pub mod multiplexer;
pub mod ports;
pub mod registry;
pub mod use_cases;

// Re-export commonly used types
pub use config::{ConfigError, CouncilConfig};
pub use multiplexer::{CouncilRun, EventMux};
pub use ports::conversation_store::{ConversationStore, StoreError};
pub use ports::model_client::{
    CompletionRequest, ModelClient, ModelClientError, StreamEvent, StreamHandle,
};
pub use registry::{ModelRegistry, RegistryError};
pub use use_cases::run_council::{CouncilRequest, RunCouncilError, RunCouncilUseCase};
