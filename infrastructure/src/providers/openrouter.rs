//! OpenRouter adapter.
//!
//! Same wire format as OpenAI, plus the optional attribution headers
//! OpenRouter uses for app rankings.

use super::chat_wire;
use crate::config::file_config::FileOpenRouterConfig;
use async_trait::async_trait;
use council_application::{CompletionRequest, ModelClient, ModelClientError, StreamHandle};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub struct OpenRouterClient {
    http: reqwest::Client,
    url: String,
}

impl OpenRouterClient {
    /// Build from provider settings; `None` when no API key is available.
    pub fn try_new(config: &FileOpenRouterConfig, timeout: Duration) -> Option<Self> {
        let Some(api_key) = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&config.api_key_env).ok())
        else {
            warn!(env = %config.api_key_env, "OpenRouter API key not configured, provider disabled");
            return None;
        };

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key)).ok()?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        if let Some(referer) = &config.referer
            && let Ok(value) = HeaderValue::from_str(referer)
        {
            headers.insert(HeaderName::from_static("http-referer"), value);
        }
        if let Some(title) = &config.title
            && let Ok(value) = HeaderValue::from_str(title)
        {
            headers.insert(HeaderName::from_static("x-title"), value);
        }

        let http = match reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "could not build OpenRouter HTTP client");
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
impl ModelClient for OpenRouterClient {
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
        let config = FileOpenRouterConfig {
            api_key_env: "LLM_COUNCIL_TEST_NO_SUCH_KEY".to_string(),
            ..Default::default()
        };
        assert!(OpenRouterClient::try_new(&config, Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_default_endpoint() {
        let config = FileOpenRouterConfig {
            api_key: Some("sk-or-test".to_string()),
            ..Default::default()
        };
        let client = OpenRouterClient::try_new(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(client.url, "https://openrouter.ai/api/v1/chat/completions");
    }
}
