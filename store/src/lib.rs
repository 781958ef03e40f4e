//! The chunk store capability consumed by the ingest core.
//!
//! Treated as a capability-based collaborator (`add`, `get`) with no
//! inheritance: backends (local filesystem, a remote search index, ...) are
//! independent implementations behind this trait. Only the filesystem
//! backend is implemented in this repository.

pub mod error;
pub mod fs;

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

pub use error::StoreError;
pub use fs::FsStore;

/// Opaque, store-assigned identifier under which a chunk can later be
/// retrieved.
pub type ChunkName = String;

/// A stream of chunk bytes, as returned by [`Store::get`].
pub type ChunkStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Async `add`/`get` capability for durable chunk storage.
///
/// Implementations may deduplicate by content; the core neither requires
/// nor assumes this.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Persists `chunk`. On success the chunk is durable enough for a
    /// subsequent `get`; on failure the ingest that produced it aborts.
    async fn add(&self, chunk: String) -> Result<ChunkName, StoreError>;

    /// Retrieves a previously added chunk as a byte stream plus its exact
    /// total length.
    async fn get(&self, name: &str) -> Result<(ChunkStream, u64), StoreError>;
}
