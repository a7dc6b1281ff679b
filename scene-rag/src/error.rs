//! Error types for the `scene-rag` crate.

use thiserror::Error;

/// Errors that can occur while discovering, indexing, or querying scripts.
#[derive(Debug, Error)]
pub enum SceneRagError {
    /// The catalog listing or a script page could not be fetched or parsed.
    #[error("Source unavailable ({url}): {message}")]
    SourceUnavailable {
        /// The URL that was being fetched.
        url: String,
        /// A description of the failure.
        message: String,
    },

    /// The requested title is not part of the catalog.
    #[error("Title not found in catalog: {0}")]
    SelectionInvalid(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the text-generation backend.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The text-generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector or collection does not have the dimensionality it was created with.
    #[error("Dimension mismatch in collection '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The collection being written or searched.
        collection: String,
        /// The dimensionality fixed at collection creation.
        expected: usize,
        /// The dimensionality that was supplied.
        actual: usize,
    },

    /// Records were embedded with a different model than the one used for the query.
    #[error("Embedding model mismatch in collection '{collection}': indexed with '{indexed}', querying with '{query}'")]
    ModelMismatch {
        /// The collection being searched.
        collection: String,
        /// The model recorded on the stored chunks.
        indexed: String,
        /// The model of the pipeline's embedding provider.
        query: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error in the pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

/// A convenience result type for scene-rag operations.
pub type Result<T> = std::result::Result<T, SceneRagError>;
