//! Byte caches for derived artifacts.
//!
//! Entries are write-once per key in practice: every key is derived from the
//! content it describes, so concurrent writers of the same key always carry
//! the same bytes and the last write wins.

mod file;

pub use file::FileByteCache;

use crate::error::{Result, SporError};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;

/// Key-value store for opaque bytes.
pub trait ByteCache: Send + Sync {
    /// Fetch the bytes stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// Content hash over an ordered list of fields.
///
/// Each field is length-prefixed so `("ab", "c")` and `("a", "bc")` hash
/// differently.
pub fn content_key(fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Cache key for an embedding of `text` produced by `model_id`.
pub fn embedding_key(text: &str, model_id: &str) -> String {
    content_key(&[model_id, text])
}

/// In-memory cache, mostly useful for tests and one-off runs.
#[derive(Default)]
pub struct MemoryByteCache {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryByteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ByteCache for MemoryByteCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| SporError::Cache(format!("Failed to acquire lock: {}", e)))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| SporError::Cache(format!("Failed to acquire lock: {}", e)))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

/// Serialize a vector as little-endian f32 bytes.
pub fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Inverse of [`vector_to_bytes`].
pub fn bytes_to_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(SporError::Cache(format!(
            "Corrupt vector entry ({} bytes)",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_key_framing() {
        assert_ne!(content_key(&["ab", "c"]), content_key(&["a", "bc"]));
        assert_eq!(content_key(&["x", "y"]), content_key(&["x", "y"]));
        assert_eq!(content_key(&["x"]).len(), 64);
    }

    #[test]
    fn test_embedding_key_depends_on_model() {
        assert_ne!(embedding_key("hello", "model-a"), embedding_key("hello", "model-b"));
    }

    #[test]
    fn test_vector_bytes_exact() {
        let vector = vec![0.1f32, -3.75, f32::MIN_POSITIVE, 1e30];
        let restored = bytes_to_vector(&vector_to_bytes(&vector)).unwrap();
        assert_eq!(
            vector.iter().map(|f| f.to_bits()).collect::<Vec<_>>(),
            restored.iter().map(|f| f.to_bits()).collect::<Vec<_>>()
        );
        assert!(bytes_to_vector(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_memory_cache() {
        let cache = MemoryByteCache::new();
        assert!(cache.get("k").unwrap().is_none());
        cache.put("k", b"v1").unwrap();
        cache.put("k", b"v2").unwrap();
        assert_eq!(cache.get("k").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(cache.len(), 1);
    }
}
