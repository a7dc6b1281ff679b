//! End-to-end scene assistant.
//!
//! [`SceneAssistant`] wires catalog discovery, indexing, query rewriting,
//! retrieval and answer synthesis together. All per-user state lives in a
//! [`Session`] value passed to each call, so one assistant can serve several
//! sessions.
//!
//! # Example
//!
//! ```rust,ignore
//! let assistant = SceneAssistant::new(catalog, pipeline, generator);
//! let titles = assistant.titles().await?;
//! let session = assistant.open(&titles, "Alien")?;
//! assistant.prepare(&session).await?;
//! let answer = assistant.ask(&session, "the chestburster scene by Dan O'Bannon").await?;
//! println!("{}", answer.text);
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};

use crate::catalog::{CatalogSource, collection_name, select_title};
use crate::document::SearchResult;
use crate::error::Result;
use crate::filter::{MetadataFilter, extract_author};
use crate::generation::TextGenerator;
use crate::pipeline::RagPipeline;
use crate::rewrite::QueryRewriter;
use crate::synthesis::{AnswerSynthesizer, join_context};

/// The script a user is working with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    /// The selected catalog title.
    pub title: String,
    /// The collection holding the title's chunks.
    pub collection: String,
}

impl Session {
    /// A session for a title, using the derived collection name.
    pub fn new(title: impl Into<String>) -> Self {
        let title = title.into();
        Self { collection: collection_name(&title), title }
    }
}

/// Outcome of [`SceneAssistant::prepare`] and [`SceneAssistant::reindex`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// The collection that was checked or filled.
    pub collection: String,
    /// Records in the collection after the call.
    pub record_count: usize,
    /// Chunks written by this call. Zero when the collection was already populated.
    pub ingested: usize,
}

/// Everything produced while answering one query.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// The query as rewritten for retrieval.
    pub rewritten_query: String,
    /// Author extracted from the raw query, if any.
    pub author: Option<String>,
    /// Retrieved chunks in rank order.
    pub results: Vec<SearchResult>,
    /// The synthesized answer.
    pub text: String,
}

/// Runs the scene-retrieval flow for explicit sessions.
pub struct SceneAssistant {
    catalog: Arc<dyn CatalogSource>,
    pipeline: Arc<RagPipeline>,
    rewriter: QueryRewriter,
    synthesizer: AnswerSynthesizer,
}

impl SceneAssistant {
    /// Create an assistant. The generator serves both rewriting and synthesis.
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        pipeline: Arc<RagPipeline>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        Self {
            catalog,
            pipeline,
            rewriter: QueryRewriter::new(generator.clone()),
            synthesizer: AnswerSynthesizer::new(generator),
        }
    }

    /// The underlying pipeline.
    pub fn pipeline(&self) -> &Arc<RagPipeline> {
        &self.pipeline
    }

    /// Fetch the catalog titles.
    pub async fn titles(&self) -> Result<Vec<String>> {
        self.catalog.fetch_titles().await
    }

    /// Validate a selection against the catalog. No network access.
    pub fn open(&self, titles: &[String], input: &str) -> Result<Session> {
        let title = select_title(titles, input)?;
        let session = Session::new(title);
        info!(title = %session.title, collection = %session.collection, "opened session");
        Ok(session)
    }

    /// Make sure the session's collection holds the script.
    ///
    /// Fetches and ingests the script only when the collection is absent or
    /// empty; an already populated collection is used as is. A collection left
    /// partly written by a failed ingestion is not detected here and keeps
    /// being used until [`reindex`](Self::reindex) rebuilds it.
    #[instrument(skip(self), fields(collection = %session.collection))]
    pub async fn prepare(&self, session: &Session) -> Result<IndexReport> {
        let existing = self.pipeline.count(&session.collection).await?;
        if existing > 0 {
            info!(record_count = existing, "collection already indexed");
            return Ok(IndexReport {
                collection: session.collection.clone(),
                record_count: existing,
                ingested: 0,
            });
        }
        self.ingest(session).await
    }

    /// Drop the session's collection and ingest the script again.
    #[instrument(skip(self), fields(collection = %session.collection))]
    pub async fn reindex(&self, session: &Session) -> Result<IndexReport> {
        self.pipeline.delete_collection(&session.collection).await?;
        self.ingest(session).await
    }

    async fn ingest(&self, session: &Session) -> Result<IndexReport> {
        let document = self.catalog.fetch_document(&session.title).await?;
        let chunks = self.pipeline.ingest(&session.collection, &document).await?;
        let record_count = self.pipeline.count(&session.collection).await?;
        Ok(IndexReport {
            collection: session.collection.clone(),
            record_count,
            ingested: chunks.len(),
        })
    }

    /// Answer a query: extract author → rewrite → retrieve → synthesize.
    #[instrument(skip(self, raw_query), fields(collection = %session.collection))]
    pub async fn ask(&self, session: &Session, raw_query: &str) -> Result<Answer> {
        let author = extract_author(raw_query);
        let filter = author.as_deref().map(MetadataFilter::author);
        let rewritten_query = self.rewriter.rewrite(raw_query).await?;

        let top_k = self.pipeline.config().top_k;
        let results = self
            .pipeline
            .retrieve(&session.collection, &rewritten_query, top_k, filter.as_ref())
            .await?;

        let context = join_context(&results);
        let text = self.synthesizer.synthesize(raw_query, &context).await?;
        info!(author = ?author, result_count = results.len(), "answered query");

        Ok(Answer { rewritten_query, author, results, text })
    }
}
