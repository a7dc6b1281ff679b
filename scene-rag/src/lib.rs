//! # scene-rag
//!
//! Retrieval-augmented scene search over movie scripts.
//!
//! The flow is a strictly sequential pipeline:
//!
//! 1. [`catalog`] discovers the available script titles and fetches one script.
//! 2. [`chunking`] splits it into overlapping chunks at scene headings.
//! 3. [`pipeline`] embeds the chunks once and appends them to a per-title
//!    collection of a [`VectorStore`].
//! 4. [`rewrite`] turns the user's request into keyword-dense retrieval text.
//! 5. [`pipeline`] retrieves the top-K nearest chunks, optionally restricted by
//!    an author extracted in [`filter`].
//! 6. [`synthesis`] composes the answer from the retrieved context.
//!
//! [`assistant::SceneAssistant`] runs all of it for an explicit [`Session`].
//!
//! ## Feature flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `qdrant` (default) | [`qdrant::QdrantVectorStore`] backend |

pub mod assistant;
pub mod catalog;
pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod generation;
pub mod inmemory;
pub mod openai;
pub mod pipeline;
#[cfg(feature = "qdrant")]
pub mod qdrant;
pub mod rewrite;
pub mod synthesis;
pub mod vectorstore;

pub use assistant::{Answer, IndexReport, SceneAssistant, Session};
pub use catalog::{CatalogSource, ImsdbCatalog};
pub use chunking::{Chunker, SceneChunker};
pub use config::{RagConfig, RagConfigBuilder, Settings};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{Result, SceneRagError};
pub use filter::{MetadataFilter, extract_author};
pub use generation::TextGenerator;
pub use inmemory::InMemoryVectorStore;
pub use openai::{OpenAIChatModel, OpenAIEmbeddingProvider};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantVectorStore;
pub use rewrite::QueryRewriter;
pub use synthesis::{AnswerSynthesizer, join_context};
pub use vectorstore::{CollectionSpec, Distance, VectorStore};
