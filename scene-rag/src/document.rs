//! Data types for scripts, chunks, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metadata key holding the script title.
pub const TITLE_KEY: &str = "title";
/// Metadata key holding the comma-separated writer names.
pub const AUTHOR_KEY: &str = "author";
/// Metadata key holding the chunk's ordinal position.
pub const CHUNK_INDEX_KEY: &str = "chunk_index";
/// Metadata key holding the embedding model a chunk was indexed with.
pub const EMBEDDING_MODEL_KEY: &str = "embedding_model";

/// A full script fetched from the catalog source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Identifier derived from the title, see [`collection_name`](crate::catalog::collection_name).
    pub id: String,
    /// The title as listed in the catalog.
    pub title: String,
    /// The normalized script text.
    pub text: String,
    /// Key-value metadata (`title`, `author`, ...).
    pub metadata: HashMap<String, String>,
    /// Optional URI pointing to the original page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_uri: Option<String>,
}

impl Document {
    /// Build a document from a title and text, deriving the ID and `title` metadata.
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        let title = title.into();
        let metadata = HashMap::from([(TITLE_KEY.to_string(), title.clone())]);
        Self {
            id: crate::catalog::collection_name(&title),
            title,
            text: text.into(),
            metadata,
            source_uri: None,
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Attach the source URI.
    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = Some(uri.into());
        self
    }
}

/// A contiguous span of a [`Document`] with its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Identifier of the form `{document_id}_{position}`.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// Zero-based ordinal of the chunk within its document.
    pub position: usize,
    /// The vector embedding for this chunk's text. Empty until indexed.
    pub embedding: Vec<f32>,
    /// Metadata inherited from the parent document plus chunk-specific fields.
    pub metadata: HashMap<String, String>,
    /// The ID of the parent [`Document`].
    pub document_id: String,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}
