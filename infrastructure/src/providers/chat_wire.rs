//! OpenAI-compatible chat-completions wire plumbing.
//!
//! Shared by the OpenAI and OpenRouter adapters: payload construction,
//! response extraction, and SSE line decoding into [`StreamEvent`]s.

use council_application::{CompletionRequest, ModelClientError, StreamEvent, StreamHandle};
use futures::TryStreamExt;
use reqwest::StatusCode;
use serde_json::{Value, json};
use std::io;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub(crate) fn request_payload(request: &CompletionRequest, stream: bool) -> Value {
    let mut payload = json!({
        "model": request.model_id,
        "messages": request.messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
    });
    if stream {
        payload["stream"] = Value::Bool(true);
    }
    payload
}

pub(crate) fn map_request_error(e: reqwest::Error) -> ModelClientError {
    if e.is_timeout() {
        ModelClientError::Timeout
    } else if e.is_connect() {
        ModelClientError::Connection(e.to_string())
    } else {
        ModelClientError::RequestFailed(e.to_string())
    }
}

fn status_error(status: StatusCode, body: &str) -> ModelClientError {
    let detail = body.chars().take(200).collect::<String>();
    match status.as_u16() {
        404 => ModelClientError::ModelNotAvailable(detail),
        _ => ModelClientError::RequestFailed(format!("HTTP {}: {}", status.as_u16(), detail)),
    }
}

/// `choices[0].message.content` of a non-streaming response.
fn message_text(body: &Value) -> Option<String> {
    body.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(str::to_string)
}

/// `choices[0].delta.content` of a streaming chunk.
fn delta_text(chunk: &Value) -> Option<&str> {
    chunk
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
}

/// Non-streaming chat completion.
pub(crate) async fn complete_chat(
    http: &reqwest::Client,
    url: &str,
    request: &CompletionRequest,
) -> Result<String, ModelClientError> {
    let response = http
        .post(url)
        .json(&request_payload(request, false))
        .send()
        .await
        .map_err(map_request_error)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }

    let body: Value = response.json().await.map_err(map_request_error)?;
    message_text(&body).ok_or_else(|| {
        ModelClientError::RequestFailed("malformed completion response".to_string())
    })
}

/// Streaming chat completion over SSE.
///
/// The response body is read line by line on a spawned task; each
/// `data:` payload becomes a [`StreamEvent::Delta`], terminated by
/// `Completed` on `[DONE]` or end of body. Cancellation drops the body,
/// which closes the connection (hard detach).
pub(crate) async fn stream_chat(
    http: &reqwest::Client,
    url: &str,
    request: &CompletionRequest,
    cancel: CancellationToken,
) -> Result<StreamHandle, ModelClientError> {
    let response = http
        .post(url)
        .json(&request_payload(request, true))
        .send()
        .await
        .map_err(map_request_error)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }

    let byte_stream = response.bytes_stream().map_err(io::Error::other);
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        let reader = StreamReader::new(byte_stream);
        let mut lines = FramedRead::new(reader, LinesCodec::new());
        let mut full = String::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("model stream cancelled");
                    return;
                }
                line = lines.next() => match line {
                    Some(Ok(line)) => {
                        let Some(data) = line
                            .strip_prefix("data: ")
                            .or_else(|| line.strip_prefix("data:"))
                        else {
                            continue;
                        };
                        let data = data.trim();
                        if data == "[DONE]" {
                            let _ = tx.send(StreamEvent::Completed(full)).await;
                            return;
                        }
                        // Undecodable SSE payloads are skipped, not fatal.
                        let Ok(value) = serde_json::from_str::<Value>(data) else {
                            continue;
                        };
                        if let Some(chunk) = delta_text(&value)
                            && !chunk.is_empty()
                        {
                            full.push_str(chunk);
                            if tx.send(StreamEvent::Delta(chunk.to_string())).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        let _ = tx
                            .send(StreamEvent::Error(ModelClientError::RequestFailed(
                                e.to_string(),
                            )))
                            .await;
                        return;
                    }
                    None => {
                        let _ = tx.send(StreamEvent::Completed(full)).await;
                        return;
                    }
                }
            }
        }
    });

    Ok(StreamHandle::new(rx))
}
