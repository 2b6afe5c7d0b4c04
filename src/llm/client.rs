use std::env;
use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use reqwest::Client;
use tracing::{debug, warn};

use super::sse::SseTokenStream;
use super::types::{ApiErrorBody, ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::secret::ApiKey;

const API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Bound for the non-streamed completion only. The streaming call is left
/// unbounded: a client-side timeout would also cover body delivery and abort
/// long answers mid-stream.
const COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("OPENAI_API_KEY not set. Get one at https://platform.openai.com/api-keys")]
    ApiKeyNotSet,

    #[error("model API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("malformed model response: {0}")]
    InvalidResponse(String),

    #[error("model stream error: {0}")]
    Stream(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Sequence of incremental content fragments from a streamed completion.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send>>;

/// Abstraction for the external language-model provider.
/// Implemented by `ChatClient` for production; mock implementations used in tests.
pub trait ChatProvider {
    /// Single non-streamed completion; returns the full answer text.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ChatError>;

    /// Streamed completion; fragments arrive in provider order.
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TokenStream, ChatError>;
}

#[derive(Clone)]
pub struct ChatClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

impl ChatClient {
    pub fn from_env(http: Client) -> Result<Self, ChatError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| ChatError::ApiKeyNotSet)?;
        if api_key.trim().is_empty() {
            return Err(ChatError::ApiKeyNotSet);
        }
        let model = env::var("OPENAI_MODEL")
            .ok()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Ok(Self {
            http,
            api_key: ApiKey(api_key.trim().to_string()),
            model,
            base_url: API_BASE.to_string(),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey("test-key".to_string()),
            model: DEFAULT_MODEL.to_string(),
            base_url: base_url.to_string(),
        }
    }

    fn request_body(&self, messages: Vec<ChatMessage>, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            stream,
        }
    }

    async fn post_completions(
        &self,
        body: &ChatCompletionRequest,
        timeout: Option<Duration>,
    ) -> Result<reqwest::Response, ChatError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut request = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key.0)
            .header("User-Agent", crate::USER_AGENT)
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .ok()
                .and_then(|body| body.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| {
                    let snippet = if text.len() > 200 { &text[..200] } else { &text };
                    format!("HTTP {status}: {snippet}")
                });
            warn!(status = %status, "model API error");
            return Err(ChatError::Api {
                code: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

impl ChatProvider for ChatClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, ChatError> {
        let body = self.request_body(messages, false);
        let response = self
            .post_completions(&body, Some(COMPLETION_TIMEOUT))
            .await?;

        let completion: ChatCompletionResponse = response.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::InvalidResponse("no completion choices".to_string()))?;

        debug!(model = %self.model, "completion finished");
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TokenStream, ChatError> {
        let body = self.request_body(messages, true);
        let response = self.post_completions(&body, None).await?;

        debug!(model = %self.model, "completion stream opened");
        Ok(Box::pin(SseTokenStream::new(response.bytes_stream())))
    }
}
