//! Indexed retrieval over embedded chunks.
//!
//! [`Retriever::build`] embeds chunks (through whatever cache the embedder
//! carries) into an exact [`FlatIndex`]; [`Retriever::retrieve`] returns the
//! chunks closest to a query.

mod index;

pub use index::{cosine_similarity, l2_distance, DistanceMetric, FlatIndex, SearchResult};

use crate::chunking::Chunk;
use crate::embedding::Embedder;
use crate::error::{Result, SporError};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A built index ready for queries.
#[derive(Debug, Clone)]
pub struct RetrieverHandle {
    index: FlatIndex,
}

impl RetrieverHandle {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }
}

/// Builds and queries chunk indexes.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    metric: DistanceMetric,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            metric: DistanceMetric::Cosine,
        }
    }

    /// Set the similarity metric.
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Embed every chunk and load the vectors into an index.
    ///
    /// A repeated `(source_id, sequence_index)` keeps its first occurrence.
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<RetrieverHandle> {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if seen.insert((chunk.source_id.clone(), chunk.sequence_index)) {
                unique.push(chunk);
            } else {
                warn!(
                    "Skipping duplicate chunk {}#{}",
                    chunk.source_id, chunk.sequence_index
                );
            }
        }

        let mut index = FlatIndex::new(self.metric);
        if unique.is_empty() {
            return Ok(RetrieverHandle { index });
        }

        let texts: Vec<String> = unique.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        if vectors.len() != unique.len() {
            return Err(SporError::EmbeddingService(format!(
                "Expected {} vectors, got {}",
                unique.len(),
                vectors.len()
            )));
        }

        let dimension = vectors[0].len();
        let expected = self.embedder.dimensions();
        if expected != 0 && dimension != expected {
            return Err(SporError::EmbeddingService(format!(
                "Embedding dimension {} does not match the configured {}",
                dimension, expected
            )));
        }
        for (chunk, vector) in unique.into_iter().zip(vectors) {
            if vector.len() != dimension {
                return Err(SporError::EmbeddingService(format!(
                    "Inconsistent embedding dimension: expected {}, got {}",
                    dimension,
                    vector.len()
                )));
            }
            index.insert(chunk, vector);
        }

        info!("Indexed {} chunks ({} dimensions)", index.len(), dimension);
        Ok(RetrieverHandle { index })
    }

    /// The `top_k` chunks most similar to `query`, best first.
    pub async fn retrieve(&self, handle: &RetrieverHandle, query: &str, top_k: usize) -> Result<Vec<Chunk>> {
        Ok(self
            .search(handle, query, top_k)
            .await?
            .into_iter()
            .map(|r| r.chunk)
            .collect())
    }

    /// Like [`Retriever::retrieve`] but keeps the similarity scores.
    #[instrument(skip(self, handle), fields(query = %query))]
    pub async fn search(&self, handle: &RetrieverHandle, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        if handle.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query).await?;
        if let Some(dimension) = handle.index.dimension() {
            if query_vector.len() != dimension {
                return Err(SporError::EmbeddingService(format!(
                    "Query has {} dimensions but the index has {}",
                    query_vector.len(),
                    dimension
                )));
            }
        }
        let results = handle.index.search(&query_vector, top_k);
        debug!("Retrieved {} of {} chunks", results.len(), handle.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryByteCache;
    use crate::embedding::CachedEmbedder;
    use crate::testing::{FailingEmbedder, VocabEmbedder};

    const VOCAB: &[&str] = &["sky", "blue", "grass", "green", "sea", "deep", "the", "is"];

    fn chunks() -> Vec<Chunk> {
        vec![
            Chunk::new("The sky is blue.", "doc", 0),
            Chunk::new("The grass is green.", "doc", 1),
            Chunk::new("The sea is deep and blue.", "doc", 2),
            Chunk::new("Green grass, green grass.", "doc", 3),
        ]
    }

    #[tokio::test]
    async fn test_rebuild_is_served_from_cache() {
        let inner = Arc::new(VocabEmbedder::new(VOCAB));
        let embedder = Arc::new(CachedEmbedder::new(inner.clone(), Arc::new(MemoryByteCache::new())));
        let retriever = Retriever::new(embedder);

        let first = retriever.build(chunks()).await.unwrap();
        let embedded = inner.texts_embedded();
        assert_eq!(embedded, 4);

        let second = retriever.build(chunks()).await.unwrap();
        assert_eq!(inner.texts_embedded(), embedded);

        for pos in 0..first.len() {
            let a: Vec<u32> = first.index().vector(pos).unwrap().iter().map(|f| f.to_bits()).collect();
            let b: Vec<u32> = second.index().vector(pos).unwrap().iter().map(|f| f.to_bits()).collect();
            assert_eq!(a, b);
        }
    }

    #[tokio::test]
    async fn test_retrieve_bounds_order_and_uniqueness() {
        let retriever = Retriever::new(Arc::new(VocabEmbedder::new(VOCAB)));
        let mut input = chunks();
        input.push(Chunk::new("The sky is blue.", "doc", 0));
        let handle = retriever.build(input).await.unwrap();
        assert_eq!(handle.len(), 4);

        let results = retriever.search(&handle, "green grass", 3).await.unwrap();
        assert_eq!(results.len(), 3);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        let ids: HashSet<_> = results.iter().map(|r| (r.chunk.source_id.clone(), r.chunk.sequence_index)).collect();
        assert_eq!(ids.len(), results.len());
        assert_eq!(results[0].chunk.sequence_index, 3);

        let all = retriever.retrieve(&handle, "blue", 10).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let embedder = Arc::new(VocabEmbedder::new(VOCAB));
        let retriever = Retriever::new(embedder.clone());
        let handle = retriever.build(Vec::new()).await.unwrap();

        assert!(retriever.retrieve(&handle, "sky", 3).await.unwrap().is_empty());
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_is_rejected() {
        let handle = Retriever::new(Arc::new(VocabEmbedder::new(&["sky", "blue", "sea"])))
            .build(chunks())
            .await
            .unwrap();
        assert_eq!(handle.index().dimension(), Some(3));

        let narrow = Retriever::new(Arc::new(VocabEmbedder::new(&["sky", "blue"])));
        let err = narrow.search(&handle, "blue sky", 2).await.unwrap_err();
        assert!(matches!(err, SporError::EmbeddingService(_)));
    }

    #[tokio::test]
    async fn test_rebuild_after_dimension_change_uses_new_size() {
        let cache = Arc::new(MemoryByteCache::new());
        let wide = Arc::new(CachedEmbedder::new(
            Arc::new(VocabEmbedder::new(&["sky", "blue", "sea"])),
            cache.clone(),
        ));
        Retriever::new(wide).build(chunks()).await.unwrap();

        let narrow_inner = Arc::new(VocabEmbedder::new(&["sky", "blue"]));
        let narrow = Retriever::new(Arc::new(CachedEmbedder::new(narrow_inner.clone(), cache)));
        let handle = narrow.build(chunks()).await.unwrap();

        assert_eq!(narrow_inner.texts_embedded(), 4);
        assert_eq!(handle.index().dimension(), Some(2));
        let results = narrow.search(&handle, "blue sky", 1).await.unwrap();
        assert_eq!(results[0].chunk.sequence_index, 0);
        assert!(results[0].score > 0.0);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_typed() {
        let retriever = Retriever::new(Arc::new(FailingEmbedder));
        let err = retriever.build(chunks()).await.unwrap_err();
        assert!(matches!(err, SporError::EmbeddingService(_)));
    }
}
