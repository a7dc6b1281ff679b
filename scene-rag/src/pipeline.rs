//! Indexing and retrieval pipeline.
//!
//! The [`RagPipeline`] coordinates ingestion (chunk → embed → append) and
//! retrieval (embed → search → threshold) by composing an
//! [`EmbeddingProvider`], a [`VectorStore`] and a [`Chunker`]. The same
//! embedding provider serves both directions, which keeps every collection
//! pinned to one model.
//!
//! # Example
//!
//! ```rust,ignore
//! use scene_rag::{InMemoryVectorStore, RagConfig, RagPipeline, SceneChunker};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .vector_store(Arc::new(InMemoryVectorStore::new()))
//!     .chunker(Arc::new(SceneChunker::with_default_boundaries(1000, 200)))
//!     .build()?;
//!
//! pipeline.ingest("alien", &document).await?;
//! let results = pipeline.retrieve("alien", "ripley bridge alarm", 5, None).await?;
//! ```

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::chunking::{Chunker, SceneChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document, EMBEDDING_MODEL_KEY, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, SceneRagError};
use crate::filter::MetadataFilter;
use crate::vectorstore::{CollectionSpec, VectorStore};

/// Wrap a stage failure with context, keeping configuration mismatches intact.
fn stage_error(stage: &str, e: SceneRagError) -> SceneRagError {
    match e {
        e @ (SceneRagError::DimensionMismatch { .. } | SceneRagError::ModelMismatch { .. }) => e,
        other => SceneRagError::PipelineError(format!("{stage}: {other}")),
    }
}

/// The indexing and retrieval orchestrator.
///
/// Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Dimensions and distance used for new collections.
    pub fn collection_spec(&self) -> CollectionSpec {
        CollectionSpec {
            dimensions: self.embedding_provider.dimensions(),
            distance: self.config.distance,
        }
    }

    /// Create the collection if it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`SceneRagError::DimensionMismatch`] if the collection exists
    /// with a different dimensionality than the embedding provider, and
    /// [`SceneRagError::PipelineError`] if the vector store fails.
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        self.vector_store.create_collection(name, self.collection_spec()).await.map_err(|e| {
            error!(collection = name, error = %e, "failed to create collection");
            stage_error(&format!("failed to create collection '{name}'"), e)
        })
    }

    /// Delete a collection and all its records.
    ///
    /// # Errors
    ///
    /// Returns [`SceneRagError::PipelineError`] if the vector store operation fails.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        self.vector_store.delete_collection(name).await.map_err(|e| {
            error!(collection = name, error = %e, "failed to delete collection");
            stage_error(&format!("failed to delete collection '{name}'"), e)
        })
    }

    /// Number of records in a collection, `0` if it does not exist.
    pub async fn count(&self, name: &str) -> Result<usize> {
        let exists = self
            .vector_store
            .collection_exists(name)
            .await
            .map_err(|e| stage_error("collection lookup failed", e))?;
        if !exists {
            return Ok(0);
        }
        self.vector_store.count(name).await.map_err(|e| stage_error("count failed", e))
    }

    /// Ingest a document: chunk → embed → append.
    ///
    /// Creates the collection on first use. Records are appended, so ingesting
    /// the same document twice stores every chunk twice. A failure part way
    /// through leaves whatever was already written in place.
    ///
    /// Returns the stored chunks, with embeddings attached, in document order.
    ///
    /// # Errors
    ///
    /// Returns [`SceneRagError::PipelineError`] if embedding or storage fails,
    /// including the document ID in the error message.
    pub async fn ingest(&self, collection: &str, document: &Document) -> Result<Vec<Chunk>> {
        let chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            warn!(document.id = %document.id, "document produced no chunks");
            return Ok(chunks);
        }
        self.ingest_chunks(collection, chunks).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "ingestion failed");
            match e {
                SceneRagError::PipelineError(message) => SceneRagError::PipelineError(format!(
                    "{message} (document '{}')",
                    document.id
                )),
                other => other,
            }
        })
    }

    /// Embed already-chunked text and append it to a collection.
    ///
    /// Chunks keep their order and positions. Each one is tagged with the
    /// embedding model so later queries can detect a model change.
    pub async fn ingest_chunks(&self, collection: &str, mut chunks: Vec<Chunk>) -> Result<Vec<Chunk>> {
        if chunks.is_empty() {
            return Ok(chunks);
        }
        self.create_collection(collection).await?;

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self
            .embedding_provider
            .embed_batch(&texts)
            .await
            .map_err(|e| stage_error("embedding failed", e))?;
        if embeddings.len() != chunks.len() {
            return Err(SceneRagError::PipelineError(format!(
                "embedding failed: expected {} vectors, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let model = self.embedding_provider.model_name().to_string();
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
            chunk.metadata.insert(EMBEDDING_MODEL_KEY.to_string(), model.clone());
        }

        self.vector_store
            .upsert(collection, &chunks)
            .await
            .map_err(|e| stage_error("upsert failed", e))?;

        info!(collection, chunk_count = chunks.len(), model = %model, "indexed chunks");
        Ok(chunks)
    }

    /// Retrieve the `top_k` chunks most similar to an (already rewritten) query.
    ///
    /// Returns `min(N, top_k)` results for a collection of `N` matching
    /// records, ordered by non-increasing score. A missing or empty collection
    /// yields an empty list. The configured `similarity_threshold`, if any, is
    /// applied after the search.
    ///
    /// # Errors
    ///
    /// - [`SceneRagError::ConfigError`] if `top_k == 0`
    /// - [`SceneRagError::DimensionMismatch`] if the collection was built with
    ///   another dimensionality than the embedding provider
    /// - [`SceneRagError::ModelMismatch`] if stored chunks were embedded with
    ///   another model
    /// - [`SceneRagError::PipelineError`] if embedding or search fails
    pub async fn retrieve(
        &self,
        collection: &str,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(SceneRagError::ConfigError("top_k must be greater than zero".to_string()));
        }

        let Some(spec) = self
            .vector_store
            .collection_spec(collection)
            .await
            .map_err(|e| stage_error("collection lookup failed", e))?
        else {
            warn!(collection, "collection does not exist, returning no results");
            return Ok(Vec::new());
        };
        let dimensions = self.embedding_provider.dimensions();
        if spec.dimensions != dimensions {
            error!(collection, expected = spec.dimensions, actual = dimensions, "dimension mismatch");
            return Err(SceneRagError::DimensionMismatch {
                collection: collection.to_string(),
                expected: spec.dimensions,
                actual: dimensions,
            });
        }

        let query_embedding = self.embedding_provider.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            stage_error("query embedding failed", e)
        })?;

        let results =
            self.search_matching(collection, &query_embedding, top_k, filter).await.map_err(|e| {
                error!(collection, error = %e, "vector store search failed");
                stage_error(&format!("search failed in collection '{collection}'"), e)
            })?;

        let model = self.embedding_provider.model_name();
        if let Some(indexed) = results
            .iter()
            .filter_map(|r| r.chunk.metadata.get(EMBEDDING_MODEL_KEY))
            .find(|indexed| indexed.as_str() != model)
        {
            error!(collection, indexed = %indexed, query = model, "embedding model mismatch");
            return Err(SceneRagError::ModelMismatch {
                collection: collection.to_string(),
                indexed: indexed.clone(),
                query: model.to_string(),
            });
        }

        let filtered: Vec<SearchResult> = match self.config.similarity_threshold {
            Some(threshold) => results.into_iter().filter(|r| r.score >= threshold).collect(),
            None => results,
        };

        debug!(collection, filtered = filter.is_some(), "search finished");
        info!(collection, result_count = filtered.len(), "retrieval completed");
        Ok(filtered)
    }

    /// Search, keeping only results that pass `filter` exactly.
    ///
    /// Backends may evaluate filters more loosely than
    /// [`MetadataFilter::matches`] (Qdrant's text match is token-based), so
    /// results are checked again here. While too few survive and the backend
    /// may hold more candidates, the search is repeated with a doubled limit.
    async fn search_matching(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let Some(filter) = filter else {
            return self.vector_store.search(collection, embedding, top_k, None).await;
        };

        let mut limit = top_k;
        loop {
            let candidates =
                self.vector_store.search(collection, embedding, limit, Some(filter)).await?;
            let exhausted = candidates.len() < limit;
            let candidate_count = candidates.len();
            let mut matching: Vec<SearchResult> =
                candidates.into_iter().filter(|r| filter.matches(&r.chunk)).collect();
            if matching.len() >= top_k || exhausted || limit == usize::MAX {
                matching.truncate(top_k);
                return Ok(matching);
            }
            debug!(collection, limit, candidate_count, kept = matching.len(), "widening filtered search");
            limit = limit.saturating_mul(2);
        }
    }

    /// Retrieve with the configured `top_k` and no metadata filter.
    pub async fn query(&self, collection: &str, query: &str) -> Result<Vec<SearchResult>> {
        self.retrieve(collection, query, self.config.top_k, None).await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The embedding provider and vector store are required. Without an explicit
/// chunker, a [`SceneChunker`] is built from the config.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`SceneRagError::ConfigError`] if a required field is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| SceneRagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| SceneRagError::ConfigError("vector_store is required".to_string()))?;
        let chunker = self.chunker.unwrap_or_else(|| {
            Arc::new(SceneChunker::new(
                config.chunk_size,
                config.chunk_overlap,
                config.boundaries.clone(),
            ))
        });

        Ok(RagPipeline { config, embedding_provider, vector_store, chunker })
    }
}
