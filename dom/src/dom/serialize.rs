//! Markup serialization, the inverse of [`parser`](super::parser).
//!
//! Round-trips with the tokenizer: parse(serialize(tree)) reconstructs the
//! same tree. The protocol client splices serialized live markup into its
//! synthetic document streams, so stability here is load-bearing.

use super::document::Document;
use super::node::{NodeId, NodeKind};
use super::parser::is_void_element;

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attribute(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn is_raw_text(tag: &str) -> bool {
    tag.eq_ignore_ascii_case("script") || tag.eq_ignore_ascii_case("style")
}

fn serialize_node(doc: &Document, node: NodeId, out: &mut String) {
    // Pull the shape out first; children are serialized without holding
    // any borrow of this node.
    enum Shape {
        Element { tag: String, attrs: Vec<(String, String)> },
        Text(String),
        Comment(String),
        Root,
    }

    let shape = if let Some(tag) = doc.tag(node) {
        Shape::Element {
            tag,
            attrs: doc.attributes(node),
        }
    } else if doc.is_text(node) {
        Shape::Text(doc.node_text(node).unwrap_or_default())
    } else if doc.is_comment(node) {
        Shape::Comment(doc.node_text(node).unwrap_or_default())
    } else {
        Shape::Root
    };

    match shape {
        Shape::Element { tag, attrs } => {
            out.push('<');
            out.push_str(&tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(&name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    escape_attribute(&value, out);
                    out.push('"');
                }
            }
            out.push('>');

            if is_void_element(&tag) {
                return;
            }

            if is_raw_text(&tag) {
                for child in doc.children(node) {
                    if let Some(text) = doc.node_text(child) {
                        out.push_str(&text);
                    }
                }
            } else {
                for child in doc.children(node) {
                    serialize_node(doc, child, out);
                }
            }

            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
        Shape::Text(text) => escape_text(&text, out),
        Shape::Comment(text) => {
            out.push_str("<!--");
            out.push_str(&text);
            out.push_str("-->");
        }
        Shape::Root => {
            for child in doc.children(node) {
                serialize_node(doc, child, out);
            }
        }
    }
}

/// Serialize one node (and its subtree) to markup.
pub fn outer_html(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    serialize_node(doc, node, &mut out);
    out
}

/// Serialize the whole document.
pub fn document_markup(doc: &Document) -> String {
    outer_html(doc, doc.root())
}

// =============================================================================
// Tests
// =============================================================================
