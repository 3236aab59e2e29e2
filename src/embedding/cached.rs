//! Cache-backed embeddings.

use super::Embedder;
use crate::cache::{bytes_to_vector, embedding_key, vector_to_bytes, ByteCache};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Wraps an embedder so document texts are only embedded once per model.
///
/// Document vectors are stored under a hash of the text and a model
/// fingerprint (`model_id@dimensions`), so changing the output size never
/// serves vectors of the old size. Query embeddings bypass the cache.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Arc<dyn ByteCache>,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, cache: Arc<dyn ByteCache>) -> Self {
        Self { inner, cache }
    }

    fn fingerprint(&self) -> String {
        format!("{}@{}", self.inner.model_id(), self.inner.dimensions())
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.inner.embed(text).await
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let fingerprint = self.fingerprint();
        let keys: Vec<String> = texts.iter().map(|t| embedding_key(t, &fingerprint)).collect();

        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        for key in &keys {
            let cached = match self.cache.get(key)? {
                Some(bytes) => match bytes_to_vector(&bytes) {
                    Ok(vector) => Some(vector),
                    Err(e) => {
                        warn!("Ignoring unreadable cache entry {}: {}", key, e);
                        None
                    }
                },
                None => None,
            };
            vectors.push(cached);
        }

        // Identical texts in one batch share a key; embed each only once.
        let mut miss_texts: Vec<String> = Vec::new();
        let mut miss_keys: Vec<&str> = Vec::new();
        let mut miss_positions: HashMap<&str, usize> = HashMap::new();
        for (idx, vector) in vectors.iter().enumerate() {
            let key = keys[idx].as_str();
            if vector.is_none() && !miss_positions.contains_key(key) {
                miss_positions.insert(key, miss_keys.len());
                miss_keys.push(key);
                miss_texts.push(texts[idx].clone());
            }
        }

        debug!(
            "Embedding cache: {} hits, {} misses",
            texts.len() - vectors.iter().filter(|v| v.is_none()).count(),
            miss_texts.len()
        );

        if !miss_texts.is_empty() {
            let fresh = self.inner.embed_batch(&miss_texts).await?;
            for (key, vector) in miss_keys.iter().zip(&fresh) {
                self.cache.put(key, &vector_to_bytes(vector))?;
            }
            for (idx, slot) in vectors.iter_mut().enumerate() {
                if slot.is_none() {
                    if let Some(&pos) = miss_positions.get(keys[idx].as_str()) {
                        *slot = fresh.get(pos).cloned();
                    }
                }
            }
        }

        vectors
            .into_iter()
            .map(|v| {
                v.ok_or_else(|| {
                    crate::error::SporError::EmbeddingService(
                        "Embedding service returned fewer vectors than requested".to_string(),
                    )
                })
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}
