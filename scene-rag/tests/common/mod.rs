//! Deterministic stand-ins for the external services.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use scene_rag::document::AUTHOR_KEY;
use scene_rag::{
    CatalogSource, Chunk, CollectionSpec, Document, EmbeddingProvider, InMemoryVectorStore,
    MetadataFilter, Result, SceneRagError, SearchResult, TextGenerator, VectorStore,
};

/// Bag-of-words embedding: each lowercase word bumps one hashed dimension.
pub struct MockEmbeddingProvider {
    dimensions: usize,
    model: String,
}

impl MockEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, model: "mock-embedding".to_string() }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut emb = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            emb[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Embedding provider that always fails.
pub struct FailingEmbeddingProvider;

#[async_trait]
impl EmbeddingProvider for FailingEmbeddingProvider {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(SceneRagError::EmbeddingError {
            provider: "mock".to_string(),
            message: "quota exceeded".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        8
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// Mock embeddings that fail for the first `failures` calls.
pub struct FlakyEmbeddingProvider {
    inner: MockEmbeddingProvider,
    failures_left: AtomicUsize,
}

impl FlakyEmbeddingProvider {
    pub fn new(dimensions: usize, failures: usize) -> Self {
        Self { inner: MockEmbeddingProvider::new(dimensions), failures_left: AtomicUsize::new(failures) }
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
            return Err(SceneRagError::EmbeddingError {
                provider: "flaky".to_string(),
                message: "connection reset".to_string(),
            });
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}

/// In-memory store whose filters match like a full-text index: every token of
/// the filter value must appear somewhere in the field, in any order.
#[derive(Default)]
pub struct TokenMatchStore {
    inner: InMemoryVectorStore,
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl VectorStore for TokenMatchStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.inner.collection_exists(name).await
    }

    async fn collection_spec(&self, name: &str) -> Result<Option<CollectionSpec>> {
        self.inner.collection_spec(name).await
    }

    async fn create_collection(&self, name: &str, spec: CollectionSpec) -> Result<()> {
        self.inner.create_collection(name, spec).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.inner.delete_collection(name).await
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        self.inner.upsert(collection, chunks).await
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.inner.count(collection).await
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let all = self.inner.count(collection).await?.max(1);
        let mut results = self.inner.search(collection, embedding, all, None).await?;
        if let Some(filter) = filter {
            let wanted = tokens(&filter.value);
            results.retain(|r| {
                let field = r.chunk.metadata.get(&filter.field).map(|v| tokens(v)).unwrap_or_default();
                wanted.iter().all(|t| field.contains(t))
            });
        }
        results.truncate(top_k);
        Ok(results)
    }
}

/// A recorded generation call.
#[derive(Debug, Clone)]
pub struct GenerateCall {
    pub system: String,
    pub user: String,
}

/// Generator returning queued replies, or failing when the queue is empty.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<Vec<Result<String>>>,
    calls: Mutex<Vec<GenerateCall>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut replies: Vec<Result<String>> = replies.into_iter().map(|r| Ok(r.into())).collect();
        replies.reverse();
        Self { replies: Mutex::new(replies), calls: Mutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<GenerateCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, system_instructions: &str, user_content: &str) -> Result<String> {
        self.calls.lock().unwrap().push(GenerateCall {
            system: system_instructions.to_string(),
            user: user_content.to_string(),
        });
        self.replies.lock().unwrap().pop().unwrap_or_else(|| {
            Err(SceneRagError::GenerationError {
                provider: "scripted".to_string(),
                message: "service unavailable".to_string(),
            })
        })
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Catalog serving fixed scripts and counting network-equivalent calls.
pub struct StaticCatalog {
    scripts: Vec<Document>,
    pub title_fetches: AtomicUsize,
    pub document_fetches: AtomicUsize,
}

impl StaticCatalog {
    pub fn new(scripts: Vec<Document>) -> Self {
        Self { scripts, title_fetches: AtomicUsize::new(0), document_fetches: AtomicUsize::new(0) }
    }

    pub fn document_fetches(&self) -> usize {
        self.document_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch_titles(&self) -> Result<Vec<String>> {
        self.title_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.scripts.iter().map(|d| d.title.clone()).collect())
    }

    async fn fetch_document(&self, title: &str) -> Result<Document> {
        self.document_fetches.fetch_add(1, Ordering::SeqCst);
        self.scripts.iter().find(|d| d.title == title).cloned().ok_or_else(|| {
            SceneRagError::SourceUnavailable {
                url: format!("static://{title}"),
                message: "not found".to_string(),
            }
        })
    }
}

/// A five-scene script.
pub fn heist_script() -> Document {
    Document::new(
        "Night Train",
        "INT. STATION - NIGHT\nMARA waits on the platform with a suitcase.\n\n\
         INT. TRAIN CARRIAGE - NIGHT\nThe train rattles. MARA counts the passengers.\n\n\
         EXT. BRIDGE - NIGHT\nThe train crosses the river bridge in the rain.\n\n\
         INT. DINING CAR - NIGHT\nMARA and VIKTOR argue over the stolen diamond.\n\n\
         EXT. STATION - DAWN\nPolice cars wait as the train arrives.",
    )
    .with_metadata(AUTHOR_KEY, "John Smith, Ada Green")
}

/// A three-scene script by a different writer.
pub fn kitchen_script() -> Document {
    Document::new(
        "Kitchen Nightmares",
        "INT. KITCHEN - NIGHT\nThe chef burns the soup.\n\n\
         INT. HALLWAY - NIGHT\nA waiter runs with plates.\n\n\
         EXT. ALLEY - NIGHT\nThe chef smokes by the bins.",
    )
    .with_metadata(AUTHOR_KEY, "Jane Doe")
}
