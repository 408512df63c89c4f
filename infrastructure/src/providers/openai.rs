//! OpenAI chat-completions adapter.

use super::chat_wire;
use crate::config::file_config::FileOpenAiConfig;
use async_trait::async_trait;
use council_application::{CompletionRequest, ModelClient, ModelClientError, StreamHandle};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Client for the OpenAI API (and OpenAI-compatible endpoints via
/// `base_url` override).
pub struct OpenAiClient {
    http: reqwest::Client,
    url: String,
}

impl OpenAiClient {
    /// Build from provider settings.
    ///
    /// Returns `None` with a warning when no API key is configured or the
    /// HTTP client cannot be built, so the process can come up without
    /// this provider.
    pub fn try_new(config: &FileOpenAiConfig, timeout: Duration) -> Option<Self> {
        let Some(api_key) = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok())
        else {
            warn!(env = %config.api_key_env, "OpenAI API key not configured, provider disabled");
            return None;
        };

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key)).ok()?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = match reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "could not build OpenAI HTTP client");
                return None;
            }
        };

        Some(Self {
            http,
            url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ModelClientError> {
        chat_wire::complete_chat(&self.http, &self.url, &request).await
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> Result<StreamHandle, ModelClientError> {
        chat_wire::stream_chat(&self.http, &self.url, &request, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_without_key_is_none() {
        let config = FileOpenAiConfig {
            api_key_env: "LLM_COUNCIL_TEST_NO_SUCH_KEY".to_string(),
            ..Default::default()
        };
        assert!(OpenAiClient::try_new(&config, Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_try_new_with_direct_key_builds_endpoint() {
        let config = FileOpenAiConfig {
            api_key: Some("sk-test".to_string()),
            base_url: "https://example.test/v1/".to_string(),
            ..Default::default()
        };
        let client = OpenAiClient::try_new(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(client.url, "https://example.test/v1/chat/completions");
    }
}
