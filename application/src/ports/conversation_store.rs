//! Conversation store port
//!
//! Append-only persistence of conversations, keyed by an opaque id.
//! Implementations live in the infrastructure layer (JSON file,
//! in-memory); the core sees only this capability.

use async_trait::async_trait;
use council_domain::{ChatMessage, Conversation, CouncilTurn};
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("conversation not found: {0}")]
    NotFound(String),

    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("storage serialization error: {0}")]
    Serialization(String),
}

/// Capability for loading and appending conversations.
///
/// `append_turn` is the critical section: it must be atomic with respect
/// to concurrent turns on the same conversation. Partial turns are never
/// written; persistence happens at turn boundaries only.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load an existing conversation.
    async fn load(&self, id: &str) -> Result<Conversation, StoreError>;

    /// Create a new, empty conversation with a freshly minted id.
    async fn create(&self) -> Result<Conversation, StoreError>;

    /// Atomically append one completed turn with its message pair.
    async fn append_turn(
        &self,
        id: &str,
        user_message: ChatMessage,
        turn: CouncilTurn,
        assistant_message: ChatMessage,
    ) -> Result<(), StoreError>;

    /// Delete a conversation.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// List all conversations.
    async fn list(&self) -> Result<Vec<Conversation>, StoreError>;
}
