//! Streaming XML splitter core.
//!
//! Splits an arbitrarily large XML payload into self-contained,
//! well-formed first-level chunks as bytes arrive, without ever buffering
//! the whole document. This crate is the hard, performance-sensitive
//! kernel; the HTTP front end and storage backend live in sibling crates.

pub mod chunk;
pub mod error;
pub mod splitter;
pub mod token;
pub mod window;

pub use chunk::Chunk;
pub use error::{Error, ParseError, ParserCloseError, SplitError, WindowError};
pub use splitter::FirstLevelSplitter;
pub use token::{AsyncParser, Attribute, Drain, NamespaceBinding, QName, Token, TokenEvent};
pub use window::{Offset, Window};
