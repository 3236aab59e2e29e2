//! Directory-backed byte cache.

use super::ByteCache;
use crate::error::{Result, SporError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One file per key under a root directory.
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so readers never observe a partial entry.
pub struct FileByteCache {
    root: PathBuf,
}

impl FileByteCache {
    /// Open (and create if needed) a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(encode_key(key))
    }
}

impl ByteCache for FileByteCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let target = self.path_for(key);
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(value)?;
        tmp.persist(&target)
            .map_err(|e| SporError::Cache(format!("Failed to persist {}: {}", target.display(), e)))?;
        debug!("Cached {} bytes at {}", value.len(), target.display());
        Ok(())
    }
}

/// Map an arbitrary key onto a safe file name.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_') {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    if out.is_empty() {
        out.push_str("%00");
    }
    out
}
