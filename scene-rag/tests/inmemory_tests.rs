//! Property tests for in-memory vector store search.

use std::collections::HashMap;

use proptest::prelude::*;
use scene_rag::document::{AUTHOR_KEY, Chunk};
use scene_rag::filter::MetadataFilter;
use scene_rag::inmemory::InMemoryVectorStore;
use scene_rag::vectorstore::{CollectionSpec, Distance, VectorStore};
use scene_rag::SceneRagError;

const AUTHORS: [&str; 3] = ["John Smith", "Jane Doe, John Smith", "Ada Green"];

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a chunk with a normalized embedding and one of a few authors.
fn arb_chunk(dim: usize) -> impl Strategy<Value = Chunk> {
    ("[a-z ]{5,30}", 0usize..100, 0usize..AUTHORS.len(), arb_normalized_embedding(dim)).prop_map(
        |(text, position, author, embedding)| Chunk {
            id: format!("doc_{position}"),
            text,
            position,
            embedding,
            metadata: HashMap::from([(AUTHOR_KEY.to_string(), AUTHORS[author].to_string())]),
            document_id: "doc".to_string(),
        },
    )
}

fn chunk(id: &str, embedding: Vec<f32>) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: id.to_string(),
        position: 0,
        embedding,
        metadata: HashMap::new(),
        document_id: "doc".to_string(),
    }
}

/// *For any* set of stored chunks, a search returns `min(N, top_k)` results
/// ordered by non-increasing score, and an author filter only ever returns
/// chunks whose author field contains the value.
mod prop_inmemory_search {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_and_count_is_min_of_n_and_k(
            chunks in proptest::collection::vec(arb_chunk(DIM), 0..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, unfiltered_again) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", CollectionSpec::cosine(DIM)).await.unwrap();
                store.upsert("test", &chunks).await.unwrap();
                let results = store.search("test", &query, top_k, None).await.unwrap();
                let again = store.search("test", &query, top_k, None).await.unwrap();
                (results, again)
            });

            prop_assert_eq!(results.len(), chunks.len().min(top_k));
            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
            let ids: Vec<_> = results.iter().map(|r| (&r.chunk.id, r.score)).collect();
            let ids_again: Vec<_> = unfiltered_again.iter().map(|r| (&r.chunk.id, r.score)).collect();
            prop_assert_eq!(ids, ids_again);
        }

        #[test]
        fn author_filter_only_returns_matching_chunks(
            chunks in proptest::collection::vec(arb_chunk(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
            needle in prop::sample::select(vec!["john smith", "JANE", "Ada Green", "nobody"]),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let filter = MetadataFilter::author(needle);
            let results = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                store.create_collection("test", CollectionSpec::cosine(DIM)).await.unwrap();
                store.upsert("test", &chunks).await.unwrap();
                store.search("test", &query, top_k, Some(&filter)).await.unwrap()
            });

            let matching = chunks.iter().filter(|c| filter.matches(c)).count();
            prop_assert_eq!(results.len(), matching.min(top_k));
            for result in &results {
                let author = result.chunk.metadata[AUTHOR_KEY].to_lowercase();
                prop_assert!(author.contains(&needle.to_lowercase()));
            }
        }
    }
}

#[tokio::test]
async fn fresh_collection_returns_no_results() {
    let store = InMemoryVectorStore::new();
    store.create_collection("empty", CollectionSpec::cosine(4)).await.unwrap();
    let results = store.search("empty", &[1.0, 0.0, 0.0, 0.0], 5, None).await.unwrap();
    assert!(results.is_empty());
    assert_eq!(store.count("empty").await.unwrap(), 0);
}

#[tokio::test]
async fn upsert_appends_duplicates() {
    let store = InMemoryVectorStore::new();
    store.create_collection("dup", CollectionSpec::cosine(2)).await.unwrap();
    let chunks = vec![chunk("a", vec![1.0, 0.0]), chunk("b", vec![0.0, 1.0])];
    store.upsert("dup", &chunks).await.unwrap();
    store.upsert("dup", &chunks).await.unwrap();
    assert_eq!(store.count("dup").await.unwrap(), 4);
}

#[tokio::test]
async fn recreating_with_other_spec_is_rejected() {
    let store = InMemoryVectorStore::new();
    store.create_collection("c", CollectionSpec::cosine(4)).await.unwrap();
    store.create_collection("c", CollectionSpec::cosine(4)).await.unwrap();

    let err = store.create_collection("c", CollectionSpec::cosine(8)).await.unwrap_err();
    assert!(matches!(err, SceneRagError::DimensionMismatch { expected: 4, actual: 8, .. }));

    let dot = CollectionSpec { dimensions: 4, distance: Distance::Dot };
    let err = store.create_collection("c", dot).await.unwrap_err();
    assert!(matches!(err, SceneRagError::ConfigError(_)));
}

#[tokio::test]
async fn wrong_vector_length_is_rejected() {
    let store = InMemoryVectorStore::new();
    store.create_collection("c", CollectionSpec::cosine(3)).await.unwrap();
    let err = store.upsert("c", &[chunk("a", vec![1.0, 0.0])]).await.unwrap_err();
    assert!(matches!(err, SceneRagError::DimensionMismatch { expected: 3, actual: 2, .. }));
    assert_eq!(store.count("c").await.unwrap(), 0);
}

#[tokio::test]
async fn dot_product_ranks_by_magnitude() {
    let store = InMemoryVectorStore::new();
    let spec = CollectionSpec { dimensions: 2, distance: Distance::Dot };
    store.create_collection("dot", spec).await.unwrap();
    store
        .upsert("dot", &[chunk("short", vec![1.0, 0.0]), chunk("long", vec![3.0, 0.0])])
        .await
        .unwrap();
    let results = store.search("dot", &[1.0, 0.0], 2, None).await.unwrap();
    assert_eq!(results[0].chunk.id, "long");
    assert_eq!(results[0].score, 3.0);
}

#[tokio::test]
async fn missing_collection_is_a_store_error() {
    let store = InMemoryVectorStore::new();
    let err = store.search("nope", &[1.0], 1, None).await.unwrap_err();
    assert!(matches!(err, SceneRagError::VectorStoreError { .. }));
}
