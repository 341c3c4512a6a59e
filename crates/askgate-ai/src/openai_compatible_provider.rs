use crate::embedding::Embedder;
use crate::llm_provider::*;
use crate::{ProviderError, ProviderResult};
use askgate_core::ProviderSettings;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Connection details for an OpenAI-compatible endpoint (OpenAI, Ollama, LM Studio, vLLM).
#[derive(Debug, Clone)]
pub struct OpenAICompatibleConfig {
    /// Base URL for the API (e.g., "http://localhost:11434/v1")
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    /// Some local servers accept no key at all.
    pub api_key: Option<SecretString>,
    /// Hard HTTP timeout; the gate applies its own per-call budget on top.
    pub timeout: Duration,
    pub provider_name: String,
}

impl Default for OpenAICompatibleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
            provider_name: "openai-compatible".to_string(),
        }
    }
}

impl OpenAICompatibleConfig {
    pub fn from_settings(settings: &ProviderSettings, timeout: Duration) -> Self {
        Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.chat_model.clone(),
            embedding_model: settings.embedding_model.clone(),
            api_key: settings.api_key.clone(),
            timeout,
            ..Default::default()
        }
    }

    fn client(&self) -> ProviderResult<Client> {
        Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ProviderError::fatal(format!("failed to create HTTP client: {e}")))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {}", key.expose_secret())),
            None => builder,
        }
    }
}

/// Chat completions against `{base_url}/chat/completions`.
///
/// A single attempt per call; retry and concurrency limits live in
/// [`crate::RetryPolicy`] and [`crate::GatedProvider`].
pub struct OpenAICompatibleProvider {
    config: OpenAICompatibleConfig,
    client: Client,
}

impl OpenAICompatibleProvider {
    pub fn new(config: OpenAICompatibleConfig) -> ProviderResult<Self> {
        let client = config.client()?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    #[instrument(skip(self, messages, config), fields(model = %self.config.model))]
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> ProviderResult<LLMResponse> {
        let request = ChatCompletionsRequest {
            model: &self.config.model,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stop: config.stop.clone(),
        };

        let builder = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Content-Type", "application/json")
            .json(&request);
        let response = self
            .config
            .authorize(builder)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(&self.config.provider_name, status, &body));
        }

        let chat: ChatCompletionsResponse = response.json().await.map_err(|e| {
            ProviderError::fatal(format!(
                "failed to parse {} chat response: {e}",
                self.config.provider_name
            ))
        })?;
        let choice = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::fatal("no choices in response"))?;
        let content = choice
            .message
            .content
            .ok_or_else(|| ProviderError::fatal("choice carries no content"))?;

        debug!(
            "completion finished: {:?}, {} chars",
            choice.finish_reason,
            content.len()
        );
        Ok(LLMResponse {
            content,
            total_tokens: chat.usage.map(|u| u.total_tokens),
            finish_reason: choice.finish_reason,
            model: chat.model.unwrap_or_else(|| self.config.model.clone()),
        })
    }

    fn provider_name(&self) -> &str {
        &self.config.provider_name
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// Query embeddings against `{base_url}/embeddings`.
pub struct OpenAICompatibleEmbedder {
    config: OpenAICompatibleConfig,
    client: Client,
    dimension: usize,
}

impl OpenAICompatibleEmbedder {
    pub fn new(config: OpenAICompatibleConfig, dimension: usize) -> ProviderResult<Self> {
        let client = config.client()?;
        Ok(Self {
            config,
            client,
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for OpenAICompatibleEmbedder {
    #[instrument(skip(self, text), fields(model = %self.config.embedding_model))]
    async fn embed(&self, text: &str) -> ProviderResult<Vec<f32>> {
        let request = EmbeddingsRequest {
            model: &self.config.embedding_model,
            input: text,
        };
        let builder = self
            .client
            .post(format!("{}/embeddings", self.config.base_url))
            .header("Content-Type", "application/json")
            .json(&request);
        let response = self
            .config
            .authorize(builder)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(&self.config.provider_name, status, &body));
        }

        let parsed: EmbeddingsResponse = response.json().await.map_err(|e| {
            ProviderError::fatal(format!(
                "failed to parse {} embeddings response: {e}",
                self.config.provider_name
            ))
        })?;
        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ProviderError::fatal("no embedding in response"))?;

        if embedding.len() != self.dimension {
            return Err(ProviderError::fatal(format!(
                "embedding has {} dimensions, expected {}",
                embedding.len(),
                self.dimension
            )));
        }
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        &self.config.provider_name
    }
}

/// 408, 429 and 5xx are worth another attempt; every other non-success is final.
pub fn classify_status(provider: &str, status: StatusCode, body: &str) -> ProviderError {
    let message = format!("{provider} API error ({status}): {body}");
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        ProviderError::Transient(message)
    } else {
        ProviderError::Fatal(message)
    }
}

fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_decode() || err.is_builder() {
        ProviderError::fatal(err.to_string())
    } else {
        // timeouts, refused connections, resets
        ProviderError::transient(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
