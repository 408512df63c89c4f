//! Model client port
//!
//! Defines the interface for communicating with LLM providers.
//! Implementations (adapters) live in the infrastructure layer; tests use
//! scripted in-memory fakes.

use async_trait::async_trait;
use council_domain::Message;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors that can occur during model client operations
#[derive(Error, Debug, Clone)]
pub enum ModelClientError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("model not available: {0}")]
    ModelNotAvailable(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("timeout")]
    Timeout,

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

/// One completion call: model, messages, and sampling parameters.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model_id: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// One event on a model's token stream.
///
/// Adapters emit text increments as the provider produces them; the
/// stream then ends with either the complete text or a typed error. No
/// events follow a terminal one.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// A text chunk from the model.
    Delta(String),
    /// The complete response text (signals stream end).
    Completed(String),
    /// The stream failed.
    Error(ModelClientError),
}

/// Per-provider adapter for model calls.
///
/// Implementations MUST enforce a per-call timeout and, for `stream`,
/// terminate promptly when the cancellation token fires. The orchestrator
/// layers stage and turn deadlines on top.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Full-buffer completion. Used for peer reviews.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelClientError>;

    /// Streaming completion. Used for first opinions and synthesis.
    async fn stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<StreamHandle, ModelClientError>;
}

/// Handle for receiving streaming events from a model call.
///
/// Wraps an `mpsc::Receiver<StreamEvent>` and provides convenience
/// methods for consuming the stream.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Consume the stream and collect all text into a single string.
    pub async fn collect_text(mut self) -> Result<String, ModelClientError> {
        let mut full_text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => full_text.push_str(&chunk),
                StreamEvent::Completed(text) => {
                    if full_text.is_empty() {
                        return Ok(text);
                    }
                    return Ok(full_text);
                }
                StreamEvent::Error(e) => {
                    return Err(e);
                }
            }
        }
        // Channel closed without Completed: return what we have
        Ok(full_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn collect_text_prefers_accumulated_deltas() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(StreamEvent::Delta("4".to_string())).await.unwrap();
        tx.send(StreamEvent::Delta(".".to_string())).await.unwrap();
        tx.send(StreamEvent::Completed("ignored".to_string()))
            .await
            .unwrap();
        drop(tx);

        let text = StreamHandle::new(rx).collect_text().await.unwrap();
        assert_eq!(text, "4.");
    }

    #[tokio::test]
    async fn collect_text_uses_completed_when_no_deltas() {
        let (tx, rx) = mpsc::channel(1);
        tx.send(StreamEvent::Completed("whole".to_string()))
            .await
            .unwrap();
        drop(tx);

        let text = StreamHandle::new(rx).collect_text().await.unwrap();
        assert_eq!(text, "whole");
    }

    #[tokio::test]
    async fn collect_text_surfaces_stream_error() {
        let (tx, rx) = mpsc::channel(1);
        tx.send(StreamEvent::Error(ModelClientError::RequestFailed(
            "boom".to_string(),
        )))
        .await
        .unwrap();
        drop(tx);

        let err = StreamHandle::new(rx).collect_text().await.unwrap_err();
        assert!(matches!(err, ModelClientError::RequestFailed(_)));
    }

    #[tokio::test]
    async fn collect_text_handles_closed_channel() {
        let (tx, rx) = mpsc::channel::<StreamEvent>(1);
        tx.send(StreamEvent::Delta("partial".to_string()))
            .await
            .unwrap();
        drop(tx);

        let text = StreamHandle::new(rx).collect_text().await.unwrap();
        assert_eq!(text, "partial");
    }
}
