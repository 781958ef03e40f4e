//! Error taxonomy for the chunk store.

use thiserror::Error;

/// Failure adding or retrieving a chunk.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `get` was asked for a name the backend has never seen.
    #[error("chunk {0:?} not found")]
    NotFound(String),
    /// A retryable downstream failure. The core does not retry; retry
    /// policy, if any, belongs to the store implementation.
    #[error("transient store failure: {0}")]
    Transient(String),
    /// A non-retryable failure.
    #[error("store failure: {0}")]
    Permanent(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
