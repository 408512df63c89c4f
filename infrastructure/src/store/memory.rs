//! In-memory conversation store for tests and ephemeral runs.

use async_trait::async_trait;
use council_application::{ConversationStore, StoreError};
use council_domain::{ChatMessage, Conversation, CouncilTurn};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Conversation store with no persistence.
#[derive(Default)]
pub struct MemoryConversationStore {
    conversations: Mutex<HashMap<String, Conversation>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn load(&self, id: &str) -> Result<Conversation, StoreError> {
        self.conversations
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn create(&self) -> Result<Conversation, StoreError> {
        let id = Uuid::new_v4().to_string();
        let conversation = Conversation::new(&id);
        self.conversations
            .lock()
            .await
            .insert(id, conversation.clone());
        Ok(conversation)
    }

    async fn append_turn(
        &self,
        id: &str,
        user_message: ChatMessage,
        turn: CouncilTurn,
        assistant_message: ChatMessage,
    ) -> Result<(), StoreError> {
        let mut conversations = self.conversations.lock().await;
        let conversation = conversations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        conversation.record_turn(user_message, turn, assistant_message);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.conversations
            .lock()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<Conversation>, StoreError> {
        let conversations = self.conversations.lock().await;
        let mut all: Vec<Conversation> = conversations.values().cloned().collect();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let store = MemoryConversationStore::new();
        let conversation = store.create().await.unwrap();
        store
            .append_turn(
                &conversation.id,
                ChatMessage::user("q"),
                CouncilTurn::new("t1", "q"),
                ChatMessage::assistant("a"),
            )
            .await
            .unwrap();

        let loaded = store.load(&conversation.id).await.unwrap();
        assert_eq!(loaded.messages.len(), 2);

        store.delete(&conversation.id).await.unwrap();
        assert!(matches!(
            store.load(&conversation.id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
