//! Streaming HTML tokenizer and tree builder.
//!
//! Markup arrives in chunks (network body, synthetic document stream); the
//! tokenizer emits a token as soon as it is complete and holds partial input
//! until the next chunk. Only the subset of HTML this runtime produces and
//! patches is handled: elements, attributes, text, comments, void elements,
//! and raw-text elements (`script`, `style`).

use super::document::Document;
use super::node::NodeId;

/// One complete markup token.
#[derive(Debug, Clone, PartialEq)]
pub enum HtmlToken {
    Open {
        tag: String,
        attributes: Vec<(String, String)>,
        self_closing: bool,
    },
    Close(String),
    Text(String),
    Comment(String),
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void_element(tag: &str) -> bool {
    VOID_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.iter().any(|v| v.eq_ignore_ascii_case(tag))
}

// =============================================================================
// Tokenizer
// =============================================================================

pub struct Tokenizer {
    buffer: String,
    /// Inside a raw-text element: its tag, waiting for the close tag.
    raw_text_tag: Option<String>,
    finished: bool,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            raw_text_tag: None,
            finished: false,
        }
    }

    /// Feed a chunk of markup.
    pub fn push(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
    }

    /// Signal end of input; trailing text is then flushed as a token.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    fn consume(&mut self, len: usize) {
        self.buffer.drain(..len);
    }

    /// Next complete token, or None when more input is needed (or the
    /// stream is exhausted).
    pub fn next_token(&mut self) -> Option<HtmlToken> {
        loop {
            if self.buffer.is_empty() {
                return None;
            }

            if let Some(tag) = self.raw_text_tag.clone() {
                return self.next_raw_text(&tag);
            }

            if self.buffer.starts_with("<!--") {
                return match self.buffer.find("-->") {
                    Some(end) => {
                        let comment = self.buffer[4..end].to_string();
                        self.consume(end + 3);
                        Some(HtmlToken::Comment(comment))
                    }
                    None if self.finished => {
                        let comment = self.buffer[4.min(self.buffer.len())..].to_string();
                        self.buffer.clear();
                        Some(HtmlToken::Comment(comment))
                    }
                    None => None,
                };
            }

            if self.buffer.starts_with("</") {
                return match self.buffer.find('>') {
                    Some(end) => {
                        let tag = self.buffer[2..end].trim().to_string();
                        self.consume(end + 1);
                        Some(HtmlToken::Close(tag))
                    }
                    None => None,
                };
            }

            // Doctype and other declarations are skipped wholesale.
            if self.buffer.starts_with("<!") {
                match self.buffer.find('>') {
                    Some(end) => {
                        self.consume(end + 1);
                        continue;
                    }
                    None => return None,
                }
            }

            if self.buffer.starts_with('<') {
                let end = match find_tag_end(&self.buffer) {
                    Some(end) => end,
                    None => return None,
                };
                let inner = self.buffer[1..end].to_string();
                self.consume(end + 1);

                let (tag, attributes, self_closing) = parse_tag(&inner);
                if !self_closing && is_raw_text_element(&tag) {
                    self.raw_text_tag = Some(tag.clone());
                }
                return Some(HtmlToken::Open {
                    tag,
                    attributes,
                    self_closing,
                });
            }

            // Text run up to the next tag open.
            return match self.buffer.find('<') {
                Some(0) => unreachable!("handled above"),
                Some(idx) => {
                    let text = decode_entities(&self.buffer[..idx]);
                    self.consume(idx);
                    Some(HtmlToken::Text(text))
                }
                None if self.finished => {
                    let text = decode_entities(&self.buffer);
                    self.buffer.clear();
                    Some(HtmlToken::Text(text))
                }
                None => None,
            };
        }
    }

    /// Raw text runs until the matching close tag; entities stay encoded.
    fn next_raw_text(&mut self, tag: &str) -> Option<HtmlToken> {
        let close = format!("</{tag}");
        let idx = self
            .buffer
            .to_ascii_lowercase()
            .find(&close.to_ascii_lowercase());

        match idx {
            Some(0) => {
                self.raw_text_tag = None;
                // Re-enter normal mode; the close tag parses as usual.
                self.next_token()
            }
            Some(idx) => {
                let text = self.buffer[..idx].to_string();
                self.consume(idx);
                Some(HtmlToken::Text(text))
            }
            None if self.finished => {
                self.raw_text_tag = None;
                let text = std::mem::take(&mut self.buffer);
                Some(HtmlToken::Text(text))
            }
            None => None,
        }
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Find the closing `>` of an open tag, honoring quoted attribute values.
fn find_tag_end(buffer: &str) -> Option<usize> {
    let bytes = buffer.as_bytes();
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate().skip(1) {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'>' => return Some(i),
                _ => {}
            },
        }
    }
    None
}

/// Split the inside of an open tag into name, attributes and self-closing.
fn parse_tag(inner: &str) -> (String, Vec<(String, String)>, bool) {
    let mut inner = inner.trim();
    let self_closing = inner.ends_with('/');
    if self_closing {
        inner = inner[..inner.len() - 1].trim_end();
    }

    let name_end = inner
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(inner.len());
    let tag = inner[..name_end].to_string();
    let mut rest = inner[name_end..].trim_start();

    let mut attributes = Vec::new();
    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_string();
        rest = rest[name_end..].trim_start();

        if let Some(stripped) = rest.strip_prefix('=') {
            let value_part = stripped.trim_start();
            let (value, remaining) = match value_part.as_bytes().first() {
                Some(&q @ (b'"' | b'\'')) => {
                    let q = q as char;
                    match value_part[1..].find(q) {
                        Some(end) => (value_part[1..end + 1].to_string(), &value_part[end + 2..]),
                        None => (value_part[1..].to_string(), ""),
                    }
                }
                _ => {
                    let end = value_part
                        .find(|c: char| c.is_ascii_whitespace())
                        .unwrap_or(value_part.len());
                    (value_part[..end].to_string(), &value_part[end..])
                }
            };
            if !name.is_empty() {
                attributes.push((name, decode_entities(&value)));
            }
            rest = remaining.trim_start();
        } else if !name.is_empty() {
            // Presence-only attribute.
            attributes.push((name, String::new()));
        } else {
            break;
        }
    }

    (tag, attributes, self_closing)
}

/// Decode the entities the serializer produces.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

// =============================================================================
// Tree builder
// =============================================================================

/// Builds arena nodes from tokens as they arrive, rooted under `container`.
pub struct StreamingBuilder<'a> {
    doc: &'a Document,
    tokenizer: Tokenizer,
    stack: Vec<NodeId>,
}

impl<'a> StreamingBuilder<'a> {
    pub fn new(doc: &'a Document, container: NodeId) -> Self {
        Self {
            doc,
            tokenizer: Tokenizer::new(),
            stack: vec![container],
        }
    }

    pub fn push_chunk(&mut self, chunk: &str) {
        self.tokenizer.push(chunk);
        self.drain();
    }

    pub fn finish(&mut self) {
        self.tokenizer.finish();
        self.drain();
    }

    fn top(&self) -> NodeId {
        *self.stack.last().expect("builder stack never empties")
    }

    fn drain(&mut self) {
        while let Some(token) = self.tokenizer.next_token() {
            match token {
                HtmlToken::Open {
                    tag,
                    attributes,
                    self_closing,
                } => {
                    let parent = self.top();
                    let el = self.doc.create_element_in(&tag, Some(parent));
                    for (name, value) in attributes {
                        self.doc.set_attribute(el, &name, &value);
                    }
                    self.doc.append(parent, el);
                    if !self_closing && !is_void_element(&tag) {
                        self.stack.push(el);
                    }
                }
                HtmlToken::Close(tag) => {
                    // Pop to the matching open element; unmatched closes are
                    // dropped.
                    if let Some(pos) = self.stack.iter().rposition(|&n| {
                        self.doc
                            .tag(n)
                            .is_some_and(|t| t.eq_ignore_ascii_case(&tag))
                    }) {
                        if pos > 0 {
                            self.stack.truncate(pos);
                        }
                    }
                }
                HtmlToken::Text(text) => {
                    let parent = self.top();
                    let node = self.doc.create_text(text);
                    self.doc.append(parent, node);
                }
                HtmlToken::Comment(text) => {
                    let parent = self.top();
                    let node = self.doc.create_comment(text);
                    self.doc.append(parent, node);
                }
            }
        }
    }
}

/// Parse a complete markup string into children of `parent`.
pub fn parse_into(doc: &Document, parent: NodeId, html: &str) {
    let mut builder = StreamingBuilder::new(doc, parent);
    builder.push_chunk(html);
    builder.finish();
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(html: &str) -> Vec<HtmlToken> {
        let mut t = Tokenizer::new();
        t.push(html);
        t.finish();
        let mut out = Vec::new();
        while let Some(token) = t.next_token() {
            out.push(token);
        }
        out
    }

    #[test]
    fn basic_element() {
        assert_eq!(
            tokens("<p class=\"big\">hi</p>"),
            vec![
                HtmlToken::Open {
                    tag: "p".into(),
                    attributes: vec![("class".into(), "big".into())],
                    self_closing: false,
                },
                HtmlToken::Text("hi".into()),
                HtmlToken::Close("p".into()),
            ]
        );
    }

    #[test]
    fn comments_and_entities() {
        assert_eq!(
            tokens("<!--o:42-->a &amp; b<!--c:42-->"),
            vec![
                HtmlToken::Comment("o:42".into()),
                HtmlToken::Text("a & b".into()),
                HtmlToken::Comment("c:42".into()),
            ]
        );
    }

    #[test]
    fn presence_only_and_unquoted_attributes() {
        assert_eq!(
            tokens("<input disabled value=3>"),
            vec![HtmlToken::Open {
                tag: "input".into(),
                attributes: vec![
                    ("disabled".into(), String::new()),
                    ("value".into(), "3".into())
                ],
                self_closing: false,
            }]
        );
    }

    #[test]
    fn quoted_gt_does_not_end_tag() {
        let toks = tokens("<div title=\"a>b\">x</div>");
        assert_eq!(
            toks[0],
            HtmlToken::Open {
                tag: "div".into(),
                attributes: vec![("title".into(), "a>b".into())],
                self_closing: false,
            }
        );
    }

    #[test]
    fn raw_text_script_content() {
        assert_eq!(
            tokens("<script>if (a < b) { go() }</script>"),
            vec![
                HtmlToken::Open {
                    tag: "script".into(),
                    attributes: vec![],
                    self_closing: false,
                },
                HtmlToken::Text("if (a < b) { go() }".into()),
                HtmlToken::Close("script".into()),
            ]
        );
    }

    #[test]
    fn tokens_survive_chunk_splits() {
        let mut t = Tokenizer::new();
        t.push("<di");
        assert_eq!(t.next_token(), None);
        t.push("v id=\"x\">he");
        assert_eq!(
            t.next_token(),
            Some(HtmlToken::Open {
                tag: "div".into(),
                attributes: vec![("id".into(), "x".into())],
                self_closing: false,
            })
        );
        assert_eq!(t.next_token(), None);
        t.push("llo</div>");
        assert_eq!(t.next_token(), Some(HtmlToken::Text("hello".into())));
        assert_eq!(t.next_token(), Some(HtmlToken::Close("div".into())));
        assert_eq!(t.next_token(), None);
    }

    #[test]
    fn builder_constructs_subtree() {
        let doc = Document::new();
        let container = doc.create_element("section");
        parse_into(&doc, container, "<ul><li>a</li><li>b</li></ul><!--end-->");

        let children = doc.children(container);
        assert_eq!(children.len(), 2);
        assert_eq!(doc.tag(children[0]), Some("ul".to_string()));
        assert!(doc.is_comment(children[1]));

        let items = doc.children(children[0]);
        assert_eq!(items.len(), 2);
        assert_eq!(doc.text_content(items[1]), "b");
    }

    #[test]
    fn builder_handles_void_elements() {
        let doc = Document::new();
        let container = doc.create_element("div");
        parse_into(&doc, container, "<br><p>after</p>");

        let children = doc.children(container);
        assert_eq!(children.len(), 2);
        assert_eq!(doc.tag(children[0]), Some("br".to_string()));
        assert_eq!(doc.text_content(children[1]), "after");
    }
}
