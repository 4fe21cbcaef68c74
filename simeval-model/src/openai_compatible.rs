//! OpenAI-compatible chat-completions client.
//!
//! Speaks the `/chat/completions` wire format, which covers OpenAI, Azure
//! OpenAI deployments and the many self-hosted gateways that mimic it. No
//! retry policy is applied here; retrying external calls is a caller
//! concern.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use simeval_core::{CompletionModel, Result, SimevalError};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Configuration for an OpenAI-compatible provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Model or deployment name.
    pub model: String,
    /// Optional API base URL (defaults to the OpenAI endpoint).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Sampling temperature; judges want this low for consistency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Completion token cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            temperature: Some(0.0),
            max_tokens: None,
        }
    }

    /// Set a custom API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the completion token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Client for OpenAI-compatible completion endpoints.
pub struct OpenAiCompatibleClient {
    client: Client,
    config: CompletionConfig,
}

impl OpenAiCompatibleClient {
    pub fn new(config: CompletionConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| SimevalError::Model(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn api_url(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(DEFAULT_API_BASE);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionModel for OpenAiCompatibleClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        tracing::debug!(model = %self.config.model, "sending completion request");

        let response = self
            .client
            .post(self.api_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| SimevalError::Model(format!("completion request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SimevalError::Model(format!(
                "completion API error {status}: {body}"
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| SimevalError::Model(format!("malformed completion response: {e}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SimevalError::Model("completion response had no content".into()))
    }
}
