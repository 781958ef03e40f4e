//! Error types shared across the splitter core.

use thiserror::Error;

use crate::window::Offset;

/// Failure reading or slicing the retained [`crate::Window`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    /// The requested offset fell outside `[head, tail]`.
    #[error("offset {offset} outside retained window [{head}, {tail})")]
    OutOfRange { offset: Offset, head: Offset, tail: Offset },
    /// The retained bytes are not valid UTF-8.
    #[error("retained bytes are not valid utf-8")]
    Utf8 {
        #[source]
        source: std::str::Utf8Error,
    },
}

/// The XML tokenizer rejected the input. Terminal for the ingest.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("parse error at byte offset {offset}: {cause}")]
pub struct ParseError {
    /// Absolute byte offset at which the failure was detected.
    pub offset: Offset,
    /// Human-readable cause, surfaced verbatim to HTTP clients.
    pub cause: String,
}

/// The splitter state machine observed an event it cannot make sense of.
#[derive(Debug, Error)]
pub enum SplitError {
    /// An `EndElement` arrived with no corresponding open element.
    #[error("end element encountered with no matching start element")]
    UnmatchedEndElement,
    /// An `EndElement`'s name doesn't match the currently open element's.
    #[error("end element </{found}> at offset {offset} does not match open element <{expected}>")]
    MismatchedEndElement { expected: String, found: String, offset: Offset },
    #[error(transparent)]
    Window(#[from] WindowError),
}

/// Releasing parser resources failed. Per contract this is logged by the
/// caller, never propagated as an ingest failure.
#[derive(Debug, Error)]
#[error("failed to release parser resources")]
pub struct ParserCloseError;

/// Aggregate error covering every way the core pipeline can fail.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Split(#[from] SplitError),
}
