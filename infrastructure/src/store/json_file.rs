//! JSON-file conversation store.
//!
//! One file holding every conversation under a `conversations` map.
//! Writes go through a temp file and rename, so a crash mid-write never
//! leaves a torn store. The single async mutex is the store's writer
//! lock; `append_turn` is atomic per call.

use async_trait::async_trait;
use council_application::{ConversationStore, StoreError};
use council_domain::{ChatMessage, Conversation, CouncilTurn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileData {
    conversations: HashMap<String, Conversation>,
}

/// File-backed store, loaded fully into memory at open.
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<FileData>,
}

impl JsonFileStore {
    /// Open (or create) the store at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?,
            Err(e) if e.kind() == ErrorKind::NotFound => FileData::default(),
            Err(e) => return Err(io_error(e)),
        };

        info!(path = %path.display(), conversations = data.conversations.len(), "opened conversation store");
        Ok(Self {
            path,
            state: Mutex::new(data),
        })
    }

    /// Write the whole store atomically (temp file + rename).
    async fn persist(&self, data: &FileData) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(data)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(io_error)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_error)?;
        Ok(())
    }
}

fn io_error(e: std::io::Error) -> StoreError {
    StoreError::Io(e.to_string())
}

#[async_trait]
impl ConversationStore for JsonFileStore {
    async fn load(&self, id: &str) -> Result<Conversation, StoreError> {
        self.state
            .lock()
            .await
            .conversations
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn create(&self) -> Result<Conversation, StoreError> {
        let id = Uuid::new_v4().to_string();
        let conversation = Conversation::new(&id);
        let mut state = self.state.lock().await;
        state.conversations.insert(id, conversation.clone());
        self.persist(&state).await?;
        Ok(conversation)
    }

    async fn append_turn(
        &self,
        id: &str,
        user_message: ChatMessage,
        turn: CouncilTurn,
        assistant_message: ChatMessage,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let conversation = state
            .conversations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        conversation.record_turn(user_message, turn, assistant_message);
        self.persist(&state).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.conversations.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.persist(&state).await
    }

    async fn list(&self) -> Result<Vec<Conversation>, StoreError> {
        let state = self.state.lock().await;
        let mut conversations: Vec<Conversation> = state.conversations.values().cloned().collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(conversations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_in(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::open(dir.path().join("conversations.json"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let created = store.create().await.unwrap();
        let loaded = store.load(&created.id).await.unwrap();
        assert_eq!(loaded, created);

        assert!(matches!(
            store.load("missing").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_append_turn_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversations.json");

        let id = {
            let store = JsonFileStore::open(&path).await.unwrap();
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
            conversation.id
        };

        let store = JsonFileStore::open(&path).await.unwrap();
        let conversation = store.load(&id).await.unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.turns.len(), 1);
        assert_eq!(conversation.messages[1].content, "a");
    }

    #[tokio::test]
    async fn test_append_to_missing_conversation_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let result = store
            .append_turn(
                "missing",
                ChatMessage::user("q"),
                CouncilTurn::new("t1", "q"),
                ChatMessage::assistant("a"),
            )
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        let a = store.create().await.unwrap();
        let b = store.create().await.unwrap();
        assert_eq!(store.list().await.unwrap().len(), 2);

        store.delete(&a.id).await.unwrap();
        let remaining = store.list().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, b.id);

        assert!(matches!(
            store.delete(&a.id).await,
            Err(StoreError::NotFound(_))
        ));
    }
}
