//! In-memory vector store.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `HashMap` of append-only record lists protected by a `tokio::sync::RwLock`.
//! It is used when no Qdrant URL is configured, and in tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Chunk, SearchResult};
use crate::error::{Result, SceneRagError};
use crate::filter::MetadataFilter;
use crate::vectorstore::{CollectionSpec, Distance, VectorStore, check_spec};

const BACKEND: &str = "InMemory";

#[derive(Debug)]
struct MemoryCollection {
    spec: CollectionSpec,
    records: Vec<Chunk>,
}

/// An in-memory vector store supporting cosine and dot-product search.
///
/// Collections map a name to a list of records in insertion order. Records are
/// never replaced, so the same chunk written twice is stored twice.
///
/// # Example
///
/// ```rust,ignore
/// use scene_rag::{CollectionSpec, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("alien", CollectionSpec::cosine(384)).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(collection: &str) -> SceneRagError {
    SceneRagError::VectorStoreError {
        backend: BACKEND.to_string(),
        message: format!("collection '{collection}' does not exist"),
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn collection_spec(&self, name: &str) -> Result<Option<CollectionSpec>> {
        Ok(self.collections.read().await.get(name).map(|c| c.spec))
    }

    async fn create_collection(&self, name: &str, spec: CollectionSpec) -> Result<()> {
        let mut collections = self.collections.write().await;
        if let Some(existing) = collections.get(name) {
            return check_spec(name, existing.spec, spec);
        }
        collections.insert(name.to_string(), MemoryCollection { spec, records: Vec::new() });
        debug!(collection = name, dimensions = spec.dimensions, "created in-memory collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != store.spec.dimensions) {
            return Err(SceneRagError::DimensionMismatch {
                collection: collection.to_string(),
                expected: store.spec.dimensions,
                actual: bad.embedding.len(),
            });
        }
        store.records.extend_from_slice(chunks);
        debug!(collection, count = chunks.len(), total = store.records.len(), "appended chunks");
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections.get(collection).map(|c| c.records.len()).ok_or_else(|| missing(collection))
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;
        if embedding.len() != store.spec.dimensions {
            return Err(SceneRagError::DimensionMismatch {
                collection: collection.to_string(),
                expected: store.spec.dimensions,
                actual: embedding.len(),
            });
        }

        let score: fn(&[f32], &[f32]) -> f32 = match store.spec.distance {
            Distance::Cosine => cosine_similarity,
            Distance::Dot => dot,
        };

        let mut scored: Vec<SearchResult> = store
            .records
            .iter()
            .filter(|chunk| filter.is_none_or(|f| f.matches(chunk)))
            .map(|chunk| SearchResult {
                chunk: chunk.clone(),
                score: score(&chunk.embedding, embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }
}
