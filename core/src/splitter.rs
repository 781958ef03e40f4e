//! The first-level splitter state machine.
//!
//! Consumes token events in document order and decides, purely from a depth
//! counter and a namespace stack, when a complete first-level (direct child
//! of the root) element has been seen — at which point it slices the
//! verbatim bytes out of the [`Window`] and wraps them into a [`Chunk`].

use tracing::trace;

use crate::chunk::Chunk;
use crate::error::SplitError;
use crate::token::{NamespaceBinding, TokenEvent};
use crate::window::{Offset, Window};

fn render_namespaces(bindings: &[NamespaceBinding]) -> String {
    let mut out = String::new();
    for b in bindings {
        match &b.prefix {
            Some(prefix) => out.push_str(&format!(" xmlns:{prefix}=\"{}\"", escape_attr(&b.uri))),
            None => out.push_str(&format!(" xmlns=\"{}\"", escape_attr(&b.uri))),
        }
    }
    out
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// Depth/namespace state machine that turns token events into chunks.
pub struct FirstLevelSplitter {
    depth: u32,
    chunk_start: Option<Offset>,
    declaration: Option<String>,
    root_name: Option<String>,
    /// one frame per currently-open element; frame 0 is the root's own
    /// bindings, which is all the wrapper synthesis ever needs since every
    /// first-level element's only ancestor is the root.
    namespace_stack: Vec<Vec<NamespaceBinding>>,
    /// name of each currently-open element, mirroring `namespace_stack`
    /// one-for-one; checked against every `EndElement` so a tag-name
    /// mismatch is rejected instead of silently unwound by depth alone.
    open_names: Vec<String>,
}

impl FirstLevelSplitter {
    pub fn new() -> Self {
        Self {
            depth: 0,
            chunk_start: None,
            declaration: None,
            root_name: None,
            namespace_stack: Vec::new(),
            open_names: Vec::new(),
        }
    }

    /// Feeds one token event at the given (one-past-end) offset into the
    /// state machine. Returns `Some(chunk)` exactly when a first-level
    /// element has just closed.
    pub fn on_event(
        &mut self,
        event: &TokenEvent,
        offset: Offset,
        window: &Window,
    ) -> Result<Option<Chunk>, SplitError> {
        match event {
            TokenEvent::StartDocument { declaration } => {
                self.declaration = declaration.clone();
                Ok(None)
            }
            TokenEvent::StartElement { name, namespaces, start_offset, .. } => {
                self.on_start_element(name, namespaces, *start_offset);
                Ok(None)
            }
            TokenEvent::EndElement { name } => self.on_end_element(name, offset, window),
            TokenEvent::Characters
            | TokenEvent::Comment
            | TokenEvent::ProcessingInstruction
            | TokenEvent::EndDocument => Ok(None),
        }
    }

    fn on_start_element(&mut self, name: &str, namespaces: &[NamespaceBinding], start_offset: Offset) {
        self.open_names.push(name.to_string());
        match self.depth {
            0 => {
                self.root_name = Some(name.to_string());
                self.namespace_stack.push(namespaces.to_vec());
                self.depth = 1;
                trace!(target: "splitter", root = name, "opened root element");
            }
            1 => {
                self.chunk_start = Some(start_offset);
                self.namespace_stack.push(namespaces.to_vec());
                self.depth = 2;
                trace!(target: "splitter", element = name, start_offset, "opened first-level element");
            }
            _ => {
                self.namespace_stack.push(namespaces.to_vec());
                self.depth += 1;
            }
        }
    }

    fn on_end_element(
        &mut self,
        name: &str,
        offset: Offset,
        window: &Window,
    ) -> Result<Option<Chunk>, SplitError> {
        if self.depth == 0 {
            return Err(SplitError::UnmatchedEndElement);
        }
        let expected = self.open_names.last().expect("open_names mirrors depth >= 1");
        if expected != name {
            return Err(SplitError::MismatchedEndElement {
                expected: expected.clone(),
                found: name.to_string(),
                offset,
            });
        }
        self.open_names.pop();
        self.namespace_stack.pop();
        match self.depth {
            1 => {
                self.depth = 0;
                Ok(None)
            }
            _ => {
                self.depth -= 1;
                if self.depth == 1 {
                    let start = self
                        .chunk_start
                        .take()
                        .expect("chunk_start is set whenever depth reaches 2");
                    let verbatim = window.text_slice(start, offset)?;
                    Ok(Some(self.synthesize_chunk(&verbatim)))
                } else {
                    Ok(None)
                }
            }
        }
    }

    fn synthesize_chunk(&self, verbatim: &str) -> Chunk {
        let decl = self.declaration.clone().unwrap_or_else(|| "<?xml version=\"1.0\"?>".to_string());
        let root = self.root_name.as_deref().expect("root_name is set before any chunk can be emitted");
        let root_bindings = self.namespace_stack.first().map(Vec::as_slice).unwrap_or(&[]);
        let mut text = String::new();
        text.push_str(&decl);
        text.push('\n');
        text.push('<');
        text.push_str(root);
        text.push_str(&render_namespaces(root_bindings));
        text.push_str(">\n");
        text.push_str(verbatim);
        text.push('\n');
        text.push_str("</");
        text.push_str(root);
        text.push_str(">\n");
        Chunk::new(text)
    }
}

impl Default for FirstLevelSplitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{AsyncParser, Drain};
    use pretty_assertions::assert_eq;

    /// Runs a whole document through `AsyncParser` + `FirstLevelSplitter`
    /// and returns the emitted chunk texts in order.
    fn split(source: &[u8]) -> Vec<String> {
        let mut window = Window::new();
        let mut parser = AsyncParser::new();
        let mut splitter = FirstLevelSplitter::new();
        window.append(source);
        parser.feed(source);
        parser.end_of_input();

        let mut chunks = Vec::new();
        loop {
            match parser.next().unwrap() {
                Drain::Incomplete => break,
                Drain::Token(tok) => {
                    let is_eof = matches!(tok.event, TokenEvent::EndDocument);
                    if let Some(chunk) = splitter.on_event(&tok.event, tok.offset, &window).unwrap() {
                        chunks.push(chunk.into_string());
                    }
                    if is_eof {
                        break;
                    }
                }
            }
        }
        chunks
    }

    /// Like `split`, but surfaces the first splitter error instead of
    /// panicking on it.
    fn split_result(source: &[u8]) -> Result<Vec<String>, SplitError> {
        let mut window = Window::new();
        let mut parser = AsyncParser::new();
        let mut splitter = FirstLevelSplitter::new();
        window.append(source);
        parser.feed(source);
        parser.end_of_input();

        let mut chunks = Vec::new();
        loop {
            match parser.next().unwrap() {
                Drain::Incomplete => break,
                Drain::Token(tok) => {
                    let is_eof = matches!(tok.event, TokenEvent::EndDocument);
                    if let Some(chunk) = splitter.on_event(&tok.event, tok.offset, &window)? {
                        chunks.push(chunk.into_string());
                    }
                    if is_eof {
                        break;
                    }
                }
            }
        }
        Ok(chunks)
    }

    #[test]
    fn single_child_with_default_namespace() {
        let chunks = split(br#"<?xml version="1.0"?><r xmlns="u"><a>x</a></r>"#);
        assert_eq!(chunks, vec!["<?xml version=\"1.0\"?>\n<r xmlns=\"u\">\n<a>x</a>\n</r>\n"]);
    }

    #[test]
    fn two_children_each_wrapped() {
        let chunks = split(b"<r><a/><b>y</b></r>");
        assert_eq!(chunks, vec!["<?xml version=\"1.0\"?>\n<r>\n<a/>\n</r>\n", "<?xml version=\"1.0\"?>\n<r>\n<b>y</b>\n</r>\n"]);
    }

    #[test]
    fn inherited_prefixed_namespace() {
        let chunks = split(br#"<r xmlns:g="gml"><g:p>1</g:p></r>"#);
        assert_eq!(chunks, vec!["<?xml version=\"1.0\"?>\n<r xmlns:g=\"gml\">\n<g:p>1</g:p>\n</r>\n"]);
    }

    #[test]
    fn namespace_uri_with_entity_is_not_double_escaped() {
        let chunks = split(br#"<r xmlns:g="a&amp;b"><g:p>1</g:p></r>"#);
        assert_eq!(chunks, vec!["<?xml version=\"1.0\"?>\n<r xmlns:g=\"a&amp;b\">\n<g:p>1</g:p>\n</r>\n"]);
    }

    #[test]
    fn empty_root_emits_no_chunks() {
        let chunks = split(b"<r/>");
        assert!(chunks.is_empty());
    }

    #[test]
    fn entities_and_cdata_pass_through_verbatim() {
        let chunks = split(b"<r><a><![CDATA[<not-a-tag>]]>&amp;</a></r>");
        assert_eq!(chunks, vec!["<?xml version=\"1.0\"?>\n<r>\n<a><![CDATA[<not-a-tag>]]>&amp;</a>\n</r>\n"]);
    }

    #[test]
    fn unmatched_end_element_is_an_error() {
        let mut splitter = FirstLevelSplitter::new();
        let window = Window::new();
        let err = splitter
            .on_event(&TokenEvent::EndElement { name: "a".into() }, 0, &window)
            .unwrap_err();
        assert!(matches!(err, SplitError::UnmatchedEndElement));
    }

    #[test]
    fn mismatched_end_element_is_rejected() {
        let err = split_result(b"<r><a></b></r>").unwrap_err();
        match err {
            SplitError::MismatchedEndElement { expected, found, .. } => {
                assert_eq!(expected, "a");
                assert_eq!(found, "b");
            }
            other => panic!("expected MismatchedEndElement, got {other:?}"),
        }
    }
}
