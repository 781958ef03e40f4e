//! Filesystem-backed [`Store`].
//!
//! Each chunk is written to `<root>/<uuid>.xml`. No fsync: the OS write is
//! as durable as this backend promises to be, per the interface contract's
//! "durability beyond what the store promises" carve-out.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{ChunkName, ChunkStream, Store, StoreError};

/// Stores chunks as individual `.xml` files under a root directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Opens (creating if necessary) `root` as the chunk directory.
    pub async fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

fn classify_io_error(name: &str, err: io::Error) -> StoreError {
    match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound(name.to_string()),
        _ => StoreError::Transient(err.to_string()),
    }
}

#[async_trait]
impl Store for FsStore {
    async fn add(&self, chunk: String) -> Result<ChunkName, StoreError> {
        let name = format!("{}.xml", Uuid::new_v4());
        let path = self.path_for(&name);
        let mut file = fs::File::create(&path)
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        file.write_all(chunk.as_bytes())
            .await
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        debug!(target: "store", name = %name, bytes = chunk.len(), "stored chunk");
        Ok(name)
    }

    async fn get(&self, name: &str) -> Result<(ChunkStream, u64), StoreError> {
        if name.contains('/') || name.contains("..") {
            return Err(StoreError::NotFound(name.to_string()));
        }
        let path: &Path = &self.path_for(name);
        let file = fs::File::open(path).await.map_err(|e| classify_io_error(name, e))?;
        let len = file.metadata().await.map_err(|e| classify_io_error(name, e))?.len();
        let stream = Box::pin(ReaderStream::new(file));
        Ok((stream, len))
    }
}

impl Default for FsStore {
    fn default() -> Self {
        warn!(target: "store", "FsStore constructed without an explicit root; using ./geochunk-data");
        Self { root: PathBuf::from("./geochunk-data") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn add_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).await.unwrap();

        let name = store.add("<r/>".to_string()).await.unwrap();
        let (mut stream, len) = store.get(&name).await.unwrap();
        assert_eq!(len, 4);

        let mut bytes = Vec::new();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(bytes, b"<r/>");
    }

    #[tokio::test]
    async fn get_unknown_name_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).await.unwrap();
        let err = store.get("missing.xml").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn get_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::open(dir.path()).await.unwrap();
        let err = store.get("../escape.xml").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
