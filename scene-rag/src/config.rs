//! Configuration for the pipeline and for the external services it calls.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chunking::DEFAULT_BOUNDARIES;
use crate::error::{Result, SceneRagError};
use crate::vectorstore::Distance;

/// Configuration parameters for the retrieval pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive size-based pieces.
    pub chunk_overlap: usize,
    /// Strings that start a new chunk wherever they appear.
    pub boundaries: Vec<String>,
    /// Number of top results to return from vector search.
    pub top_k: usize,
    /// Minimum similarity score for results. `None` keeps everything.
    pub similarity_threshold: Option<f32>,
    /// Similarity metric for newly created collections.
    pub distance: Distance,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            boundaries: DEFAULT_BOUNDARIES.iter().map(|b| b.to_string()).collect(),
            top_k: 5,
            similarity_threshold: None,
            distance: Distance::Cosine,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Replace the chunk boundary strings.
    pub fn boundaries<I, S>(mut self, boundaries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.boundaries = boundaries.into_iter().map(Into::into).collect();
        self
    }

    /// Set the number of top results to return from vector search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set the similarity metric for new collections.
    pub fn distance(mut self, distance: Distance) -> Self {
        self.config.distance = distance;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`SceneRagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - a boundary string is empty
    pub fn build(self) -> Result<RagConfig> {
        if self.config.chunk_size == 0 {
            return Err(SceneRagError::ConfigError(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.config.chunk_overlap >= self.config.chunk_size {
            return Err(SceneRagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.config.chunk_overlap, self.config.chunk_size
            )));
        }
        if self.config.top_k == 0 {
            return Err(SceneRagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if self.config.boundaries.iter().any(String::is_empty) {
            return Err(SceneRagError::ConfigError("boundaries must not be empty".to_string()));
        }
        Ok(self.config)
    }
}

/// Default OpenRouter API base.
pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";
/// Default OpenAI API base.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
/// Default catalog site.
pub const DEFAULT_CATALOG_URL: &str = "https://imsdb.com";

const DEFAULT_CHAT_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

/// Endpoints and credentials read from the environment.
///
/// | Variable | Default |
/// |---|---|
/// | `OPENROUTER_API_KEY` / `OPENAI_API_KEY` | required |
/// | `SCENE_RAG_API_BASE` | OpenRouter or OpenAI, by key |
/// | `SCENE_RAG_CHAT_MODEL` | `openai/gpt-4o-mini` |
/// | `SCENE_RAG_EMBEDDING_MODEL` | `text-embedding-3-small` |
/// | `SCENE_RAG_EMBEDDING_DIMENSIONS` | `1536` |
/// | `QDRANT_URL` | unset, in-memory store |
/// | `SCENE_RAG_CATALOG_URL` | `https://imsdb.com` |
#[derive(Clone, PartialEq)]
pub struct Settings {
    /// API key for the chat and embedding endpoints.
    pub api_key: String,
    /// Base URL of the OpenAI-compatible API.
    pub api_base: String,
    /// Chat-completion model used for rewriting and synthesis.
    pub chat_model: String,
    /// Embedding model, pinned for every collection this process touches.
    pub embedding_model: String,
    /// Embedding dimensionality.
    pub embedding_dimensions: usize,
    /// Qdrant gRPC URL. `None` selects the in-memory store.
    pub qdrant_url: Option<String>,
    /// Base URL of the script catalog.
    pub catalog_url: String,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimensions", &self.embedding_dimensions)
            .field("qdrant_url", &self.qdrant_url)
            .field("catalog_url", &self.catalog_url)
            .finish()
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let (api_key, default_base) = match (var("OPENROUTER_API_KEY"), var("OPENAI_API_KEY")) {
            (Some(key), _) => (key, OPENROUTER_API_BASE),
            (None, Some(key)) => (key, OPENAI_API_BASE),
            (None, None) => {
                return Err(SceneRagError::ConfigError(
                    "OPENROUTER_API_KEY or OPENAI_API_KEY must be set".to_string(),
                ));
            }
        };

        let embedding_dimensions = match var("SCENE_RAG_EMBEDDING_DIMENSIONS") {
            Some(raw) => raw.trim().parse::<usize>().ok().filter(|d| *d > 0).ok_or_else(|| {
                SceneRagError::ConfigError(format!(
                    "SCENE_RAG_EMBEDDING_DIMENSIONS must be a positive integer, got '{raw}'"
                ))
            })?,
            None => DEFAULT_EMBEDDING_DIMENSIONS,
        };

        Ok(Self {
            api_key,
            api_base: var("SCENE_RAG_API_BASE").unwrap_or_else(|| default_base.to_string()),
            chat_model: var("SCENE_RAG_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.into()),
            embedding_model: var("SCENE_RAG_EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.into()),
            embedding_dimensions,
            qdrant_url: var("QDRANT_URL"),
            catalog_url: var("SCENE_RAG_CATALOG_URL")
                .unwrap_or_else(|| DEFAULT_CATALOG_URL.into()),
        })
    }
}
