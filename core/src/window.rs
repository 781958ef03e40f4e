//! Append-only byte buffer retaining the unconsumed prefix of an ingest stream.

use std::fmt;

use crate::error::WindowError;

/// Absolute byte offset into the logical (unbounded) input stream.
pub type Offset = u64;

/// The retained prefix of an in-flight byte stream.
///
/// `Window` never holds the whole document in memory: bytes are released as
/// soon as both the parser and the splitter have moved past them, via
/// [`Window::advance`]. The parser reports chunk boundaries as absolute
/// offsets into the stream, but the bytes behind those offsets must still be
/// here when a chunk is cut — `Window` is the smallest structure that keeps
/// exactly those bytes.
pub struct Window {
    buf: Vec<u8>,
    /// absolute offset of `buf[0]`
    head: Offset,
}

impl Window {
    /// Creates an empty window starting at absolute offset 0.
    pub fn new() -> Self {
        Self { buf: Vec::new(), head: 0 }
    }

    /// Absolute offset of the first retained byte.
    pub fn head(&self) -> Offset {
        self.head
    }

    /// Absolute offset one past the last retained byte.
    pub fn tail(&self) -> Offset {
        self.head + self.buf.len() as Offset
    }

    /// Appends bytes at `tail`.
    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Releases bytes with absolute offset strictly less than `to`.
    ///
    /// Fails if `to` falls outside `[head, tail]`.
    pub fn advance(&mut self, to: Offset) -> Result<(), WindowError> {
        if to < self.head || to > self.tail() {
            return Err(WindowError::OutOfRange { offset: to, head: self.head, tail: self.tail() });
        }
        let drop = (to - self.head) as usize;
        self.buf.drain(..drop);
        self.head = to;
        Ok(())
    }

    fn range(&self, start: Offset, end: Offset) -> Result<(usize, usize), WindowError> {
        if start > end || start < self.head || end > self.tail() {
            return Err(WindowError::OutOfRange {
                offset: start.min(end),
                head: self.head,
                tail: self.tail(),
            });
        }
        Ok(((start - self.head) as usize, (end - self.head) as usize))
    }

    /// Returns the raw bytes of the absolute range `[start, end)`.
    pub fn byte_slice(&self, start: Offset, end: Offset) -> Result<&[u8], WindowError> {
        let (s, e) = self.range(start, end)?;
        Ok(&self.buf[s..e])
    }

    /// Returns the decoded UTF-8 text of the absolute range `[start, end)`.
    pub fn text_slice(&self, start: Offset, end: Offset) -> Result<String, WindowError> {
        let bytes = self.byte_slice(start, end)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|source| WindowError::Utf8 { source })
    }

    /// Bytes currently retained (fed, but not yet advanced past).
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("head", &self.head)
            .field("tail", &self.tail())
            .field("buffered_len", &self.buf.len())
            .finish()
    }
}
