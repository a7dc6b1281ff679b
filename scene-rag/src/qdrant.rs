//! Qdrant vector store backend.
//!
//! Provides [`QdrantVectorStore`] which implements [`VectorStore`] using
//! the [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC.
//!
//! # Example
//!
//! ```rust,ignore
//! use scene_rag::qdrant::QdrantVectorStore;
//!
//! let store = QdrantVectorStore::new("http://localhost:6334")?;
//! store.create_collection("alien", CollectionSpec::cosine(1536)).await?;
//! store.upsert("alien", &chunks).await?;
//! let results = store.search("alien", &query_embedding, 5, None).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_config::Config as VectorsConfigKind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    Distance as QdrantDistance, FieldType, Filter, PointStruct, SearchPointsBuilder,
    UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::debug;
use uuid::Uuid;

use crate::document::{AUTHOR_KEY, Chunk, SearchResult};
use crate::error::{Result, SceneRagError};
use crate::filter::MetadataFilter;
use crate::vectorstore::{CollectionSpec, Distance, VectorStore, check_spec};

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// Every chunk becomes a point with a fresh UUID, so re-ingesting the same
/// chunks appends new points. Text, position and metadata are stored as
/// payload; the `metadata.author` field gets a full-text index so author
/// filters are evaluated server-side.
pub struct QdrantVectorStore {
    client: Qdrant,
}

impl QdrantVectorStore {
    /// Create a new Qdrant vector store connecting to the given URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        Ok(Self { client })
    }

    /// Create a new Qdrant vector store with default URL (`http://localhost:6334`).
    pub fn default_url() -> Result<Self> {
        Self::new("http://localhost:6334")
    }

    /// Create a new Qdrant vector store from an existing client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn map_err(e: qdrant_client::QdrantError) -> SceneRagError {
        SceneRagError::VectorStoreError { backend: "qdrant".to_string(), message: e.to_string() }
    }

    /// Extract a string from a Qdrant payload value.
    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn extract_position(value: &QdrantValue) -> Option<usize> {
        match &value.kind {
            Some(Kind::IntegerValue(n)) => usize::try_from(*n).ok(),
            _ => None,
        }
    }

    fn to_qdrant_distance(distance: Distance) -> QdrantDistance {
        match distance {
            Distance::Cosine => QdrantDistance::Cosine,
            Distance::Dot => QdrantDistance::Dot,
        }
    }

    fn from_qdrant_distance(distance: i32) -> Result<Distance> {
        match QdrantDistance::try_from(distance) {
            Ok(QdrantDistance::Cosine) => Ok(Distance::Cosine),
            Ok(QdrantDistance::Dot) => Ok(Distance::Dot),
            other => Err(SceneRagError::ConfigError(format!(
                "unsupported qdrant distance: {other:?}"
            ))),
        }
    }

    fn payload_json(chunk: &Chunk) -> serde_json::Value {
        let metadata: serde_json::Map<String, serde_json::Value> = chunk
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::json!({
            "text": chunk.text,
            "position": chunk.position,
            "chunk_id": chunk.id,
            "document_id": chunk.document_id,
            "metadata": metadata,
        })
    }

    fn payload_for(chunk: &Chunk) -> Result<Payload> {
        Payload::try_from(Self::payload_json(chunk)).map_err(Self::map_err)
    }

    /// Rebuild a chunk (without its embedding) from a stored payload.
    fn chunk_from_payload(payload: &HashMap<String, QdrantValue>) -> Chunk {
        let string_field =
            |key: &str| payload.get(key).and_then(Self::extract_string).unwrap_or_default();

        let metadata: HashMap<String, String> = payload
            .get("metadata")
            .and_then(|v| match &v.kind {
                Some(Kind::StructValue(s)) => Some(
                    s.fields
                        .iter()
                        .filter_map(|(k, v)| Self::extract_string(v).map(|s| (k.clone(), s)))
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default();

        Chunk {
            id: string_field("chunk_id"),
            text: string_field("text"),
            position: payload.get("position").and_then(Self::extract_position).unwrap_or_default(),
            embedding: vec![],
            metadata,
            document_id: string_field("document_id"),
        }
    }

    /// Server-side prefilter. Text match is token-based, so the pipeline
    /// rechecks every result with [`MetadataFilter::matches`].
    fn filter_for(filter: &MetadataFilter) -> Filter {
        Filter::must([Condition::matches_text(format!("metadata.{}", filter.field), filter.value.clone())])
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client.collection_exists(name).await.map_err(Self::map_err)
    }

    async fn collection_spec(&self, name: &str) -> Result<Option<CollectionSpec>> {
        if !self.collection_exists(name).await? {
            return Ok(None);
        }
        let info = self.client.collection_info(name).await.map_err(Self::map_err)?;
        let params = info
            .result
            .and_then(|r| r.config)
            .and_then(|c| c.params)
            .and_then(|p| p.vectors_config)
            .and_then(|v| v.config);
        match params {
            Some(VectorsConfigKind::Params(params)) => Ok(Some(CollectionSpec {
                dimensions: params.size as usize,
                distance: Self::from_qdrant_distance(params.distance)?,
            })),
            _ => Err(SceneRagError::VectorStoreError {
                backend: "qdrant".to_string(),
                message: format!("collection '{name}' does not use a single unnamed vector"),
            }),
        }
    }

    async fn create_collection(&self, name: &str, spec: CollectionSpec) -> Result<()> {
        if let Some(existing) = self.collection_spec(name).await? {
            debug!(collection = name, "qdrant collection already exists, skipping creation");
            return check_spec(name, existing, spec);
        }

        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(
                VectorParamsBuilder::new(spec.dimensions as u64, Self::to_qdrant_distance(spec.distance)),
            ))
            .await
            .map_err(Self::map_err)?;

        self.client
            .create_field_index(
                CreateFieldIndexCollectionBuilder::new(
                    name,
                    format!("metadata.{AUTHOR_KEY}"),
                    FieldType::Text,
                )
                .wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection = name, dimensions = spec.dimensions, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        if !self.collection_exists(name).await? {
            return Ok(());
        }
        self.client.delete_collection(name).await.map_err(Self::map_err)?;
        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points = chunks
            .iter()
            .map(|chunk| -> Result<PointStruct> {
                Ok(PointStruct::new(
                    Uuid::new_v4().to_string(),
                    chunk.embedding.clone(),
                    Self::payload_for(chunk)?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection, count = chunks.len(), "appended chunks to qdrant");
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(collection).exact(true))
            .await
            .map_err(Self::map_err)?;
        Ok(response.result.map_or(0, |r| r.count as usize))
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchResult>> {
        let mut request = SearchPointsBuilder::new(collection, embedding.to_vec(), top_k as u64)
            .with_payload(true);
        if let Some(filter) = filter {
            request = request.filter(Self::filter_for(filter));
        }

        let response = self.client.search_points(request).await.map_err(Self::map_err)?;

        let results = response
            .result
            .into_iter()
            .map(|scored| SearchResult {
                chunk: Self::chunk_from_payload(&scored.payload),
                score: scored.score,
            })
            .collect();

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use qdrant_client::qdrant::Struct;
    use qdrant_client::qdrant::condition::ConditionOneOf;
    use qdrant_client::qdrant::r#match::MatchValue;

    use super::*;
    use crate::document::{CHUNK_INDEX_KEY, EMBEDDING_MODEL_KEY};

    fn chunk() -> Chunk {
        Chunk {
            id: "alien_3".to_string(),
            text: "INT. NOSTROMO - BRIDGE\nAlarms.".to_string(),
            position: 3,
            embedding: vec![0.1, 0.2],
            metadata: HashMap::from([
                (AUTHOR_KEY.to_string(), "Dan O'Bannon".to_string()),
                (CHUNK_INDEX_KEY.to_string(), "3".to_string()),
                (EMBEDDING_MODEL_KEY.to_string(), "text-embedding-3-small".to_string()),
            ]),
            document_id: "alien".to_string(),
        }
    }

    #[test]
    fn payload_nests_metadata_under_its_own_key() {
        let payload = QdrantVectorStore::payload_json(&chunk());
        assert_eq!(payload["text"], "INT. NOSTROMO - BRIDGE\nAlarms.");
        assert_eq!(payload["position"], 3);
        assert_eq!(payload["chunk_id"], "alien_3");
        assert_eq!(payload["document_id"], "alien");
        assert_eq!(payload["metadata"][AUTHOR_KEY], "Dan O'Bannon");
        assert_eq!(payload["metadata"][EMBEDDING_MODEL_KEY], "text-embedding-3-small");
        assert!(payload.get("embedding").is_none());
        assert!(QdrantVectorStore::payload_for(&chunk()).is_ok());
    }

    #[test]
    fn author_filter_targets_the_indexed_field() {
        let filter = QdrantVectorStore::filter_for(&MetadataFilter::author("John Smith"));
        assert_eq!(filter.must.len(), 1);
        match &filter.must[0].condition_one_of {
            Some(ConditionOneOf::Field(field)) => {
                assert_eq!(field.key, format!("metadata.{AUTHOR_KEY}"));
                let value = field.r#match.as_ref().and_then(|m| m.match_value.clone());
                assert_eq!(value, Some(MatchValue::Text("John Smith".to_string())));
            }
            other => panic!("expected a field condition, got {other:?}"),
        }
    }

    #[test]
    fn payload_values_are_read_back() {
        assert_eq!(QdrantVectorStore::extract_string(&QdrantValue::from("x")), Some("x".to_string()));
        assert_eq!(QdrantVectorStore::extract_string(&QdrantValue::from(1_i64)), None);
        assert_eq!(QdrantVectorStore::extract_position(&QdrantValue::from(7_i64)), Some(7));
        assert_eq!(QdrantVectorStore::extract_position(&QdrantValue::from(-1_i64)), None);

        let metadata = Struct {
            fields: HashMap::from([(AUTHOR_KEY.to_string(), QdrantValue::from("Dan O'Bannon"))]),
        };
        let payload = HashMap::from([
            ("text".to_string(), QdrantValue::from("Alarms.")),
            ("position".to_string(), QdrantValue::from(3_i64)),
            ("chunk_id".to_string(), QdrantValue::from("alien_3")),
            ("document_id".to_string(), QdrantValue::from("alien")),
            ("metadata".to_string(), QdrantValue { kind: Some(Kind::StructValue(metadata)) }),
        ]);

        let chunk = QdrantVectorStore::chunk_from_payload(&payload);
        assert_eq!(chunk.id, "alien_3");
        assert_eq!(chunk.text, "Alarms.");
        assert_eq!(chunk.position, 3);
        assert_eq!(chunk.document_id, "alien");
        assert_eq!(chunk.metadata[AUTHOR_KEY], "Dan O'Bannon");
        assert!(chunk.embedding.is_empty());
    }

    #[test]
    fn distances_map_both_ways() {
        for distance in [Distance::Cosine, Distance::Dot] {
            let raw = QdrantVectorStore::to_qdrant_distance(distance) as i32;
            assert_eq!(QdrantVectorStore::from_qdrant_distance(raw).unwrap(), distance);
        }
        assert!(QdrantVectorStore::from_qdrant_distance(QdrantDistance::Euclid as i32).is_err());
    }
}
