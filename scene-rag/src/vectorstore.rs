//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};
use crate::error::Result;
use crate::filter::MetadataFilter;

/// Similarity metric of a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    /// Cosine similarity.
    #[default]
    Cosine,
    /// Raw inner product.
    Dot,
}

/// Parameters fixed when a collection is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Vector dimensionality.
    pub dimensions: usize,
    /// Similarity metric.
    pub distance: Distance,
}

impl CollectionSpec {
    /// A cosine collection of the given dimensionality.
    pub fn cosine(dimensions: usize) -> Self {
        Self { dimensions, distance: Distance::Cosine }
    }
}

/// A storage backend for vector embeddings with similarity search.
///
/// Collections are append-only: [`upsert`](VectorStore::upsert) never replaces
/// an existing record, so writing the same chunks twice stores them twice.
///
/// # Example
///
/// ```rust,ignore
/// use scene_rag::{CollectionSpec, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("alien", CollectionSpec::cosine(384)).await?;
/// store.upsert("alien", &chunks).await?;
/// let results = store.search("alien", &query_embedding, 5, None).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Whether a collection with this name exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// The parameters a collection was created with, or `None` if it does not exist.
    async fn collection_spec(&self, name: &str) -> Result<Option<CollectionSpec>>;

    /// Create a named collection.
    ///
    /// No-op if it already exists with the same spec. Fails with
    /// [`DimensionMismatch`](crate::SceneRagError::DimensionMismatch) or
    /// [`ConfigError`](crate::SceneRagError::ConfigError) if it exists with a
    /// different one.
    async fn create_collection(&self, name: &str, spec: CollectionSpec) -> Result<()>;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Append chunks to a collection. Chunks must have embeddings set.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Number of records in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// When `filter` is set only matching records are candidates. Returns
    /// results ordered by descending similarity score.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>>;
}

/// Check a requested spec against the one a collection already has.
pub(crate) fn check_spec(
    name: &str,
    existing: CollectionSpec,
    requested: CollectionSpec,
) -> Result<()> {
    if existing.dimensions != requested.dimensions {
        return Err(crate::SceneRagError::DimensionMismatch {
            collection: name.to_string(),
            expected: existing.dimensions,
            actual: requested.dimensions,
        });
    }
    if existing.distance != requested.distance {
        return Err(crate::SceneRagError::ConfigError(format!(
            "collection '{name}' uses {:?} distance, requested {:?}",
            existing.distance, requested.distance
        )));
    }
    Ok(())
}
