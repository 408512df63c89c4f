//! Persisted conversations.
//!
//! A [`Conversation`] is an append-only record of chat messages and the
//! council turns that produced them. Once a turn completes, the message
//! list grows by exactly two entries (one user, one assistant), so
//! `messages.len() == 2 * turns.len()` holds for completed histories.

use crate::core::clock::epoch_millis;
use crate::council::turn::CouncilTurn;
use serde::{Deserialize, Serialize};

/// Role of a persisted chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Epoch milliseconds.
    pub timestamp: u64,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            timestamp: epoch_millis(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            timestamp: epoch_millis(),
        }
    }
}

/// A conversation: ordered messages plus the turns behind them (Entity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    pub turns: Vec<CouncilTurn>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Conversation {
    pub fn new(id: impl Into<String>) -> Self {
        let now = epoch_millis();
        Self {
            id: id.into(),
            messages: Vec::new(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a completed turn and its message pair. This is the only
    /// mutation a conversation undergoes after creation.
    pub fn record_turn(&mut self, user: ChatMessage, turn: CouncilTurn, assistant: ChatMessage) {
        self.messages.push(user);
        self.messages.push(assistant);
        self.turns.push(turn);
        self.updated_at = epoch_millis();
    }

    /// The message history fed into stage-1 and stage-3 prompts.
    pub fn history(&self) -> &[ChatMessage] {
        &self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_turn_appends_message_pair() {
        let mut conversation = Conversation::new("c1");
        assert!(conversation.messages.is_empty());

        conversation.record_turn(
            ChatMessage::user("what is 2+2?"),
            CouncilTurn::new("t1", "what is 2+2?"),
            ChatMessage::assistant("Four."),
        );

        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.turns.len(), 1);
        assert_eq!(conversation.messages.len(), 2 * conversation.turns.len());
        assert_eq!(conversation.messages[0].role, ChatRole::User);
        assert_eq!(conversation.messages[1].role, ChatRole::Assistant);
        assert!(conversation.updated_at >= conversation.created_at);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut conversation = Conversation::new("c1");
        conversation.record_turn(
            ChatMessage::user("q"),
            CouncilTurn::new("t1", "q"),
            ChatMessage::assistant("a"),
        );
        let json = serde_json::to_string(&conversation).unwrap();
        let back: Conversation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, conversation);
    }
}
