//! Mapping from core/store failures to HTTP status codes.

use axum::http::StatusCode;
use geochunk_core::{ParseError, SplitError, WindowError};
use geochunk_store::StoreError;
use thiserror::Error;

/// Every way an ingest can fail, carrying enough to pick an HTTP status and
/// render the response body §6 specifies.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error("store failure: {0}")]
    Store(StoreError),
    #[error("inbound read failed: {0}")]
    Io(String),
    /// A client-supplied argument was invalid, independent of the XML body
    /// itself. Nothing in this ingest/retrieve pipeline currently takes a
    /// request-time argument beyond the body and the chunk name, so this
    /// variant is never constructed today; it's kept so the taxonomy in
    /// full matches what the interface is allowed to reject with.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The client disconnected or a timeout fired mid-ingest. Never turned
    /// into an HTTP response — the connection is already gone.
    #[error("ingest cancelled")]
    Cancelled,
}

impl IngestError {
    /// Whether this failure belongs in the "malformed input" bucket (400)
    /// rather than the "something broke on our end" bucket (500).
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            IngestError::Parse(_)
                | IngestError::Split(SplitError::UnmatchedEndElement)
                | IngestError::Split(SplitError::MismatchedEndElement { .. })
                | IngestError::InvalidArgument(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        if self.is_client_fault() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
