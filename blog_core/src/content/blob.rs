//! Binary storage for uploaded files.

use async_trait::async_trait;
use std::io;
use std::path::PathBuf;

/// Where a blob ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Filesystem (or backend) location
    pub path: String,
    /// Public URL the blob is served from
    pub url: String,
}

/// Stores and removes blobs by name
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn save(&self, name: &str, bytes: &[u8]) -> io::Result<StoredBlob>;

    /// Remove a blob; a missing blob is not an error
    async fn delete(&self, name: &str) -> io::Result<()>;
}

/// Blobs as plain files in one directory, served under `/img`
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    url_prefix: String,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            url_prefix: "/img".to_string(),
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn path_for(&self, name: &str) -> io::Result<PathBuf> {
        // Names are generated, but never let one escape the root
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid blob name: {name}"),
            ));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn save(&self, name: &str, bytes: &[u8]) -> io::Result<StoredBlob> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, bytes).await?;

        Ok(StoredBlob {
            path: path.to_string_lossy().into_owned(),
            url: format!("{}/{}", self.url_prefix, name),
        })
    }

    async fn delete(&self, name: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.path_for(name)?).await {
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("blob-test-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_save_and_delete() {
        let root = temp_root();
        let store = LocalBlobStore::new(&root);

        let stored = store.save("a.png", b"png-bytes").await.unwrap();
        assert_eq!(stored.url, "/img/a.png");
        assert_eq!(tokio::fs::read(&stored.path).await.unwrap(), b"png-bytes");

        store.delete("a.png").await.unwrap();
        assert!(!root.join("a.png").exists());

        // Second delete is a no-op
        store.delete("a.png").await.unwrap();
        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let store = LocalBlobStore::new(temp_root());

        assert!(store.save("../evil.png", b"x").await.is_err());
        assert!(store.save(".hidden", b"x").await.is_err());
        assert!(store.delete("a/b.png").await.is_err());
    }
}
