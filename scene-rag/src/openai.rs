//! OpenAI-compatible embedding and chat clients.
//!
//! Both clients call the REST API directly with `reqwest` and accept a base
//! URL, so they work against OpenAI itself and against OpenRouter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::{OPENAI_API_BASE, Settings};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, SceneRagError};
use crate::generation::TextGenerator;

const PROVIDER: &str = "OpenAI";

/// The default model for OpenAI embeddings.
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// The default dimensionality for `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

/// The default chat model.
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{path}", base.trim_end_matches('/'))
}

/// An [`EmbeddingProvider`] backed by the `/embeddings` endpoint.
///
/// # Configuration
///
/// - `model` – defaults to `text-embedding-3-small`.
/// - `dimensions` – optional Matryoshka dimension override.
/// - `base_url` – defaults to `https://api.openai.com/v1`.
///
/// # Example
///
/// ```rust,ignore
/// use scene_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let embedding = provider.embed("EXT. DESERT - DAY").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
    /// If set, passed to the API for Matryoshka dimension truncation.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a new provider with the given API key.
    ///
    /// Uses the default model (`text-embedding-3-small`) and dimensions (1536).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(SceneRagError::EmbeddingError {
                provider: PROVIDER.into(),
                message: "API key must not be empty".into(),
            });
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a provider from [`Settings`].
    ///
    /// The dimensions are only sent to the API when they differ from the
    /// model default, since not every compatible endpoint accepts the field.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let provider = Self::new(settings.api_key.clone())?
            .with_base_url(settings.api_base.clone())
            .with_model(settings.embedding_model.clone());
        Ok(if settings.embedding_dimensions == DEFAULT_DIMENSIONS {
            provider
        } else {
            provider.with_dimensions(settings.embedding_dimensions)
        })
    }

    /// Set the API base URL (e.g. `https://openrouter.ai/api/v1`).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the model name (e.g. `text-embedding-3-large`).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the output dimensions (Matryoshka support).
    ///
    /// When set, the API returns embeddings truncated to this size.
    /// This also updates the value returned by [`dimensions()`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }

    fn embedding_error(message: String) -> SceneRagError {
        SceneRagError::EmbeddingError { provider: PROVIDER.into(), message }
    }
}

// ── API request/response types ─────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Turn a non-success response into a readable message.
async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail =
        serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
    format!("API returned {status}: {detail}")
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| Self::embedding_error("API returned empty response".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(provider = PROVIDER, batch_size = texts.len(), model = %self.model, "embedding batch");

        let request_body = EmbeddingRequest {
            model: &self.model,
            input: texts.to_vec(),
            dimensions: self.request_dimensions,
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "embeddings"))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                Self::embedding_error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let message = error_detail(response).await;
            error!(provider = PROVIDER, %message, "API error");
            return Err(Self::embedding_error(message));
        }

        let embedding_response: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            Self::embedding_error(format!("failed to parse response: {e}"))
        })?;

        let mut data = embedding_response.data;
        if data.len() != texts.len() {
            return Err(Self::embedding_error(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }
        // Results carry their input index; keep input order.
        data.sort_by_key(|d| d.index.unwrap_or(usize::MAX));

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// A [`TextGenerator`] backed by the `/chat/completions` endpoint.
///
/// Sends one system message and one user message at temperature 0.
///
/// # Example
///
/// ```rust,ignore
/// use scene_rag::openai::OpenAIChatModel;
///
/// let model = OpenAIChatModel::new("sk-...")?
///     .with_base_url("https://openrouter.ai/api/v1")
///     .with_model("openai/gpt-4o-mini");
/// ```
pub struct OpenAIChatModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OpenAIChatModel {
    /// Create a new chat model client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(SceneRagError::GenerationError {
                provider: PROVIDER.into(),
                message: "API key must not be empty".into(),
            });
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: OPENAI_API_BASE.into(),
            model: DEFAULT_CHAT_MODEL.into(),
            temperature: 0.0,
        })
    }

    /// Create a chat model client from [`Settings`].
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(settings.api_key.clone())?
            .with_base_url(settings.api_base.clone())
            .with_model(settings.chat_model.clone()))
    }

    /// Set the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn generation_error(message: String) -> SceneRagError {
        SceneRagError::GenerationError { provider: PROVIDER.into(), message }
    }
}

#[async_trait]
impl TextGenerator for OpenAIChatModel {
    async fn generate(&self, system_instructions: &str, user_content: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, user_len = user_content.len(), "chat completion");

        let request_body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage { role: "system", content: system_instructions },
                ChatMessage { role: "user", content: user_content },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                Self::generation_error(format!("request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let message = error_detail(response).await;
            error!(provider = PROVIDER, %message, "API error");
            return Err(Self::generation_error(message));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to parse response");
            Self::generation_error(format!("failed to parse response: {e}"))
        })?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Self::generation_error("response contained no message content".into()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(endpoint("https://openrouter.ai/api/v1/", "embeddings"), "https://openrouter.ai/api/v1/embeddings");
        assert_eq!(endpoint("http://localhost:1234", "chat/completions"), "http://localhost:1234/chat/completions");
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(OpenAIEmbeddingProvider::new("").is_err());
        assert!(OpenAIChatModel::new("").is_err());
    }
}
