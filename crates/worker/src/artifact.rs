//! Artifact store for oversized action output.
//!
//! Output above the inline threshold is written here and the action
//! result row keeps only a pointer. Pointers are content-addressed by
//! SHA-256, so identical output stored twice costs one file.

use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where oversized output goes.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` and return an opaque pointer for the result row.
    async fn put(&self, bytes: &[u8]) -> Result<String, ArtifactError>;

    /// Fetch previously stored bytes by pointer.
    async fn get(&self, pointer: &str) -> Result<Vec<u8>, ArtifactError>;
}

/// Filesystem-backed store: `<root>/ab/cdef...` keyed by hex digest.
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, digest: &str) -> PathBuf {
        // Two-level fanout keeps directories small.
        self.root.join(&digest[..2]).join(&digest[2..])
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, bytes: &[u8]) -> Result<String, ArtifactError> {
        let digest = hex_digest(bytes);
        let path = self.path_for(&digest);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(digest);
        }
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write via temp file + rename so readers never see partial
        // content.
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(digest)
    }

    async fn get(&self, pointer: &str) -> Result<Vec<u8>, ArtifactError> {
        Ok(tokio::fs::read(self.path_for(pointer)).await?)
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsArtifactStore::new(dir.path());

        let pointer = store.put(b"large output body").await.expect("put");
        let bytes = store.get(&pointer).await.expect("get");
        assert_eq!(bytes, b"large output body");
    }

    #[tokio::test]
    async fn identical_content_shares_a_pointer() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsArtifactStore::new(dir.path());

        let a = store.put(b"same").await.expect("put a");
        let b = store.put(b"same").await.expect("put b");
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn missing_pointer_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsArtifactStore::new(dir.path());
        let digest = hex_digest(b"never stored");
        assert!(store.get(&digest).await.is_err());
    }
}
