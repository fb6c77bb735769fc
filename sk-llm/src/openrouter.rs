use crate::error::{CompletionError, Result};
use crate::types::ChatMessage;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai";
const CHAT_COMPLETIONS_PATH: &str = "/api/v1/chat/completions";

/// Client-side cap on one round trip. Small on purpose: `chat_once` occupies
/// its calling worker for the whole call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Stateless OpenRouter client. Holds no mutable state between calls, so
/// clones may issue completions concurrently without coordination.
#[derive(Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    timeout: Duration,
}

impl OpenRouterClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(api_key: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: OPENROUTER_BASE_URL.to_string(),
            timeout,
        }
    }

    /// Read the key from `OPENROUTER_API_KEY`. An absent key is not an error
    /// here; `chat_once` reports it as `[401]` without touching the network.
    pub fn from_env() -> Self {
        Self::new(std::env::var(API_KEY_ENV).ok())
    }

    /// Point the client at a different host. Used by tests against a mock
    /// server; production code keeps the default.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Issue exactly one completion call and return the reply text together
    /// with the wall-clock elapsed milliseconds.
    #[tracing::instrument(level = "info", skip_all, fields(model = %model))]
    pub async fn chat_once(&self, messages: &[ChatMessage], model: &str) -> Result<(String, u64)> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(CompletionError::MissingApiKey);
        };

        let req = OpenRouterChatRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
        };
        let url = format!("{}{CHAT_COMPLETIONS_PATH}", self.base_url);

        let started = Instant::now();
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| classify_transport_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(e, self.timeout))?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let parsed: OpenRouterChatResponse = serde_json::from_str(&body)
            .map_err(|e| CompletionError::UnexpectedResponse(e.to_string()))?;
        let text = parsed.reply_text().ok_or_else(|| {
            CompletionError::UnexpectedResponse(
                "missing choices[0].message.content".to_string(),
            )
        })?;

        tracing::debug!(elapsed_ms, "completion finished");
        Ok((text, elapsed_ms))
    }
}

fn classify_transport_error(e: reqwest::Error, timeout: Duration) -> CompletionError {
    if e.is_timeout() {
        CompletionError::Timeout(timeout)
    } else {
        CompletionError::Connection(e.to_string())
    }
}

fn classify_status(status: reqwest::StatusCode) -> CompletionError {
    match status.as_u16() {
        401 => CompletionError::KeyRejected,
        429 => CompletionError::RateLimited,
        s => CompletionError::Upstream(s),
    }
}

#[derive(Debug, Serialize)]
struct OpenRouterChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChatResponse {
    #[serde(default)]
    choices: Vec<OpenRouterChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenRouterChoice {
    #[serde(default)]
    message: OpenRouterChoiceMessage,
}

#[derive(Debug, Deserialize, Default)]
struct OpenRouterChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenRouterChatResponse {
    fn reply_text(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|c| c.message.content)
    }
}
