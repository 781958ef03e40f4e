//! Feed-driven XML tokenizer adapter.
//!
//! `AsyncParser` owns no external buffers: callers `feed` it bytes (the same
//! bytes appended to the [`crate::Window`]) and pull tokens with `next`,
//! which returns [`Drain::Incomplete`] when the buffered bytes don't yet
//! contain a whole token. Boundary detection — finding where the next `<...>`
//! markup unit ends, quote- and bracket-aware — is hand-rolled here; once a
//! complete unit is isolated, decoding its name/attributes is delegated to
//! `quick_xml`, which already knows how to do that correctly.

use std::collections::VecDeque;

use quick_xml::events::Event as QxEvent;

use crate::error::{ParseError, ParserCloseError};
use crate::window::Offset;

/// A qualified element or attribute name, as it appeared in the source
/// (prefix included, unresolved).
pub type QName = String;

/// A `prefix -> URI` binding introduced by a single start tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceBinding {
    /// `None` for the default namespace (a bare `xmlns="..."`).
    pub prefix: Option<String>,
    pub uri: String,
}

/// A non-namespace attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// One tokenizer event, carrying everything the splitter needs to decide a
/// chunk boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    /// Emitted exactly once, before any other event. `declaration` holds the
    /// source's own `<?xml ...?>` text when present.
    StartDocument { declaration: Option<String> },
    StartElement {
        name: QName,
        namespaces: Vec<NamespaceBinding>,
        attributes: Vec<Attribute>,
        /// absolute offset of the `<` that opens this tag
        start_offset: Offset,
    },
    EndElement { name: QName },
    /// Character data; content is never inspected, only its span matters.
    Characters,
    Comment,
    /// Also covers `<!DOCTYPE ...>` declarations — neither carries meaning
    /// for first-level splitting.
    ProcessingInstruction,
    EndDocument,
}

/// A decoded event together with the absolute offset one past its last byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub event: TokenEvent,
    pub offset: Offset,
}

/// The result of pulling on the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drain {
    /// The buffered bytes don't contain a complete next token; `feed` more
    /// before calling `next` again.
    Incomplete,
    Token(Token),
}

#[derive(Debug, Clone, Copy)]
enum MarkupKind {
    ProcessingInstruction,
    Comment,
    CData,
    Doctype,
    EndTag,
    StartOrEmptyTag,
}

impl MarkupKind {
    fn classify(buf: &[u8]) -> Option<MarkupKind> {
        if buf.len() < 2 {
            return None;
        }
        match buf[1] {
            b'?' => Some(MarkupKind::ProcessingInstruction),
            b'/' => Some(MarkupKind::EndTag),
            b'!' => Self::classify_bang(buf),
            _ => Some(MarkupKind::StartOrEmptyTag),
        }
    }

    fn classify_bang(buf: &[u8]) -> Option<MarkupKind> {
        if buf.len() >= 4 && &buf[..4] == b"<!--" {
            return Some(MarkupKind::Comment);
        }
        if buf.len() >= 9 && &buf[..9] == b"<![CDATA[" {
            return Some(MarkupKind::CData);
        }
        if buf.len() >= 9 && buf[..9].eq_ignore_ascii_case(b"<!DOCTYPE") {
            return Some(MarkupKind::Doctype);
        }
        if buf.len() < 9 {
            None
        } else {
            // some other bang form (e.g. a conditional section); treat like
            // a markup declaration, terminated the same way DOCTYPE is.
            Some(MarkupKind::Doctype)
        }
    }

    fn find_end(self, buf: &[u8]) -> Option<usize> {
        match self {
            MarkupKind::ProcessingInstruction => find_subslice(buf, b"?>").map(|p| p + 2),
            MarkupKind::Comment => find_subslice(&buf[4..], b"-->").map(|p| p + 4 + 3),
            MarkupKind::CData => find_subslice(&buf[9..], b"]]>").map(|p| p + 9 + 3),
            MarkupKind::Doctype => find_doctype_end(buf),
            MarkupKind::EndTag | MarkupKind::StartOrEmptyTag => find_unquoted_gt(buf),
        }
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Scans for the first unquoted `>`, tracking single/double quoted attribute
/// values so a `>` inside e.g. `href=">"` doesn't end the tag early.
fn find_unquoted_gt(buf: &[u8]) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (i, &b) in buf.iter().enumerate().skip(1) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return Some(i + 1),
                _ => {}
            },
        }
    }
    None
}

/// Like [`find_unquoted_gt`] but also tracks `[...]` internal-subset nesting
/// so `<!DOCTYPE d [ <!ENTITY x "y"> ]>` isn't cut at the inner `>`.
fn find_doctype_end(buf: &[u8]) -> Option<usize> {
    let mut quote: Option<u8> = None;
    let mut depth: i32 = 0;
    for (i, &b) in buf.iter().enumerate().skip(2) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'[' => depth += 1,
                b']' => depth -= 1,
                b'>' if depth <= 0 => return Some(i + 1),
                _ => {}
            },
        }
    }
    None
}

fn decode(reader: &quick_xml::Reader<&[u8]>, bytes: &[u8]) -> String {
    reader.decoder().decode(bytes).map(|c| c.into_owned()).unwrap_or_default()
}

type StartParts = (QName, Vec<NamespaceBinding>, Vec<Attribute>, bool);

/// Decodes an attribute's value, resolving character-set encoding *and*
/// XML entity references (`&amp;`, `&#39;`, ...) exactly once, so the
/// result is the value's true text rather than still-escaped markup.
fn decode_value(attr: &quick_xml::events::attributes::Attribute<'_>) -> Result<String, String> {
    attr.unescape_value().map(|c| c.into_owned()).map_err(|e| e.to_string())
}

fn split_attrs(
    reader: &quick_xml::Reader<&[u8]>,
    bs: &quick_xml::events::BytesStart<'_>,
    is_empty: bool,
) -> Result<StartParts, String> {
    let name = decode(reader, bs.name().as_ref());
    let mut namespaces = Vec::new();
    let mut attributes = Vec::new();
    for attr in bs.attributes().flatten() {
        let key = decode(reader, attr.key.as_ref());
        let value = decode_value(&attr)?;
        if key == "xmlns" {
            namespaces.push(NamespaceBinding { prefix: None, uri: value });
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            namespaces.push(NamespaceBinding { prefix: Some(prefix.to_string()), uri: value });
        } else {
            attributes.push(Attribute { name: key, value });
        }
    }
    Ok((name, namespaces, attributes, is_empty))
}

fn decode_start(unit: &[u8]) -> Result<StartParts, String> {
    let mut reader = quick_xml::Reader::from_reader(unit);
    let mut scratch = Vec::new();
    match reader.read_event_into(&mut scratch) {
        Ok(QxEvent::Start(bs)) => split_attrs(&reader, &bs, false),
        Ok(QxEvent::Empty(bs)) => split_attrs(&reader, &bs, true),
        Ok(other) => Err(format!("expected a start tag, found {other:?}")),
        Err(e) => Err(e.to_string()),
    }
}

fn decode_end_name(unit: &[u8]) -> Result<QName, String> {
    let mut reader = quick_xml::Reader::from_reader(unit);
    let mut scratch = Vec::new();
    match reader.read_event_into(&mut scratch) {
        Ok(QxEvent::End(be)) => Ok(decode(&reader, be.name().as_ref())),
        Ok(other) => Err(format!("expected an end tag, found {other:?}")),
        Err(e) => Err(e.to_string()),
    }
}

/// bytes above which we compact the internal buffer even if less than half
/// of it has been consumed; keeps a single huge element from growing the
/// drain-on-compact cost unboundedly.
const COMPACT_THRESHOLD: usize = 64 * 1024;

/// Thin adapter over a pull-style, feed-driven XML tokenizer.
pub struct AsyncParser {
    buf: Vec<u8>,
    pos: usize,
    base_offset: Offset,
    eof: bool,
    started: bool,
    end_document_emitted: bool,
    pending: VecDeque<Token>,
}

impl AsyncParser {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            base_offset: 0,
            eof: false,
            started: false,
            end_document_emitted: false,
            pending: VecDeque::new(),
        }
    }

    /// Appends bytes to the parser's own copy of the unconsumed tail.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Signals that no more bytes will ever be fed.
    pub fn end_of_input(&mut self) {
        self.eof = true;
    }

    /// Releases parser resources. There is nothing external to release for
    /// this in-memory scanner; kept for symmetry with the adapter contract,
    /// whose failures callers must log rather than propagate.
    pub fn close(&mut self) -> Result<(), ParserCloseError> {
        self.buf.clear();
        self.pending.clear();
        Ok(())
    }

    fn absolute(&self, pos: usize) -> Offset {
        self.base_offset + pos as Offset
    }

    fn compact(&mut self) {
        if self.pos >= COMPACT_THRESHOLD || self.pos * 2 >= self.buf.len().max(1) {
            self.buf.drain(..self.pos);
            self.base_offset += self.pos as Offset;
            self.pos = 0;
        }
    }

    fn error_at(&self, offset: Offset, cause: impl Into<String>) -> ParseError {
        ParseError { offset, cause: cause.into() }
    }

    /// Pulls the next token, or `Incomplete` if the fed bytes don't yet
    /// contain a whole one.
    pub fn next(&mut self) -> Result<Drain, ParseError> {
        if let Some(tok) = self.pending.pop_front() {
            return Ok(Drain::Token(tok));
        }
        if !self.started {
            return self.start_document();
        }
        if self.end_document_emitted {
            return Ok(Drain::Incomplete);
        }

        let remaining = &self.buf[self.pos..];
        if remaining.is_empty() {
            if self.eof {
                self.end_document_emitted = true;
                let offset = self.absolute(self.pos);
                return Ok(Drain::Token(Token { event: TokenEvent::EndDocument, offset }));
            }
            return Ok(Drain::Incomplete);
        }

        if remaining[0] != b'<' {
            self.scan_characters()
        } else {
            self.scan_markup()
        }
    }

    fn start_document(&mut self) -> Result<Drain, ParseError> {
        let remaining = &self.buf[self.pos..];
        if remaining.len() < 5 {
            if self.eof {
                self.started = true;
                let offset = self.absolute(self.pos);
                return Ok(Drain::Token(Token {
                    event: TokenEvent::StartDocument { declaration: None },
                    offset,
                }));
            }
            return Ok(Drain::Incomplete);
        }
        if remaining[..5].eq_ignore_ascii_case(b"<?xml") {
            match find_subslice(remaining, b"?>") {
                Some(p) => {
                    let end = p + 2;
                    let decl = std::str::from_utf8(&remaining[..end])
                        .map_err(|e| self.error_at(self.absolute(self.pos), e.to_string()))?
                        .to_owned();
                    self.pos += end;
                    self.started = true;
                    let offset = self.absolute(self.pos);
                    self.compact();
                    Ok(Drain::Token(Token {
                        event: TokenEvent::StartDocument { declaration: Some(decl) },
                        offset,
                    }))
                }
                None => {
                    if self.eof {
                        Err(self.error_at(self.absolute(self.pos), "unterminated xml declaration"))
                    } else {
                        Ok(Drain::Incomplete)
                    }
                }
            }
        } else {
            self.started = true;
            let offset = self.absolute(self.pos);
            Ok(Drain::Token(Token { event: TokenEvent::StartDocument { declaration: None }, offset }))
        }
    }

    fn scan_characters(&mut self) -> Result<Drain, ParseError> {
        let remaining = &self.buf[self.pos..];
        match memchr::memchr(b'<', remaining) {
            Some(i) => {
                self.pos += i;
                let offset = self.absolute(self.pos);
                self.compact();
                Ok(Drain::Token(Token { event: TokenEvent::Characters, offset }))
            }
            None => {
                if self.eof {
                    self.pos += remaining.len();
                    let offset = self.absolute(self.pos);
                    self.compact();
                    Ok(Drain::Token(Token { event: TokenEvent::Characters, offset }))
                } else {
                    Ok(Drain::Incomplete)
                }
            }
        }
    }

    fn scan_markup(&mut self) -> Result<Drain, ParseError> {
        let remaining = &self.buf[self.pos..];
        let kind = match MarkupKind::classify(remaining) {
            Some(k) => k,
            None => {
                return if self.eof {
                    Err(self.error_at(self.absolute(self.pos), "truncated markup at end of input"))
                } else {
                    Ok(Drain::Incomplete)
                };
            }
        };
        let end = match kind.find_end(remaining) {
            Some(e) => e,
            None => {
                return if self.eof {
                    Err(self.error_at(self.absolute(self.pos), "unterminated markup"))
                } else {
                    Ok(Drain::Incomplete)
                };
            }
        };

        let start_offset = self.absolute(self.pos);
        let unit = remaining[..end].to_vec();
        self.pos += end;
        let end_offset = self.absolute(self.pos);
        self.compact();
        self.decode_unit(kind, &unit, start_offset, end_offset)
    }

    fn decode_unit(
        &mut self,
        kind: MarkupKind,
        unit: &[u8],
        start_offset: Offset,
        end_offset: Offset,
    ) -> Result<Drain, ParseError> {
        match kind {
            MarkupKind::Comment | MarkupKind::CData | MarkupKind::Doctype => {
                Ok(Drain::Token(Token { event: TokenEvent::Comment, offset: end_offset }))
            }
            MarkupKind::ProcessingInstruction => {
                Ok(Drain::Token(Token { event: TokenEvent::ProcessingInstruction, offset: end_offset }))
            }
            MarkupKind::EndTag => {
                let name = decode_end_name(unit).map_err(|cause| self.error_at(end_offset, cause))?;
                Ok(Drain::Token(Token { event: TokenEvent::EndElement { name }, offset: end_offset }))
            }
            MarkupKind::StartOrEmptyTag => {
                let (name, namespaces, attributes, is_empty) =
                    decode_start(unit).map_err(|cause| self.error_at(end_offset, cause))?;
                let start = Token {
                    event: TokenEvent::StartElement { name: name.clone(), namespaces, attributes, start_offset },
                    offset: end_offset,
                };
                if is_empty {
                    self.pending.push_back(Token {
                        event: TokenEvent::EndElement { name },
                        offset: end_offset,
                    });
                }
                Ok(Drain::Token(start))
            }
        }
    }
}

impl Default for AsyncParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_all(p: &mut AsyncParser) -> Vec<Token> {
        let mut out = Vec::new();
        loop {
            match p.next().unwrap() {
                Drain::Incomplete => break,
                Drain::Token(t) => {
                    let done = matches!(t.event, TokenEvent::EndDocument);
                    out.push(t);
                    if done {
                        break;
                    }
                }
            }
        }
        out
    }

    #[test]
    fn incomplete_until_tag_closes() {
        let mut p = AsyncParser::new();
        p.feed(b"<?xml version=\"1.0\"?><r");
        // StartDocument, then Incomplete: "<r" has no closing '>' yet.
        assert!(matches!(p.next().unwrap(), Drain::Token(_)));
        assert_eq!(p.next().unwrap(), Drain::Incomplete);
        p.feed(b"/>");
        assert!(matches!(p.next().unwrap(), Drain::Token(_)));
    }

    #[test]
    fn self_closing_emits_start_then_end() {
        let mut p = AsyncParser::new();
        p.feed(b"<r><a/></r>");
        p.end_of_input();
        let tokens = drain_all(&mut p);
        let kinds: Vec<&str> = tokens
            .iter()
            .map(|t| match &t.event {
                TokenEvent::StartDocument { .. } => "start-doc",
                TokenEvent::StartElement { name, .. } if name == "r" => "start-r",
                TokenEvent::StartElement { name, .. } if name == "a" => "start-a",
                TokenEvent::EndElement { name } if name == "a" => "end-a",
                TokenEvent::EndElement { name } if name == "r" => "end-r",
                TokenEvent::EndDocument => "end-doc",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["start-doc", "start-r", "start-a", "end-a", "end-r", "end-doc"]);
    }

    #[test]
    fn namespace_attribute_is_split_out() {
        let mut p = AsyncParser::new();
        p.feed(b"<r xmlns:g=\"gml\" id=\"1\"></r>");
        p.end_of_input();
        let tokens = drain_all(&mut p);
        let start = tokens
            .iter()
            .find_map(|t| match &t.event {
                TokenEvent::StartElement { name, namespaces, attributes, .. } if name == "r" => {
                    Some((namespaces.clone(), attributes.clone()))
                }
                _ => None,
            })
            .unwrap();
        assert_eq!(start.0, vec![NamespaceBinding { prefix: Some("g".into()), uri: "gml".into() }]);
        assert_eq!(start.1, vec![Attribute { name: "id".into(), value: "1".into() }]);
    }

    #[test]
    fn attribute_entities_are_unescaped_once() {
        let mut p = AsyncParser::new();
        p.feed(b"<r href=\"a&amp;b\"></r>");
        p.end_of_input();
        let tokens = drain_all(&mut p);
        let attrs = tokens
            .iter()
            .find_map(|t| match &t.event {
                TokenEvent::StartElement { name, attributes, .. } if name == "r" => Some(attributes.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(attrs, vec![Attribute { name: "href".into(), value: "a&b".into() }]);
    }

    #[test]
    fn unterminated_tag_at_eof_is_a_parse_error() {
        let mut p = AsyncParser::new();
        p.feed(b"<r><a");
        p.end_of_input();
        assert!(p.next().is_ok()); // start-doc
        assert!(p.next().is_ok()); // start r
        assert!(p.next().unwrap_err().cause.contains("unterminated"));
    }
}
