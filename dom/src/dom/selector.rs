//! Minimal CSS selector matching for patch targeting.
//!
//! Supports the compound forms the protocol actually sends as `X-Target`:
//! tag, `#id`, `.class`, `[attr]` and `[attr=value]`, in any combination
//! (e.g. `form.login[method=post]`). No combinators.

use super::document::Document;
use super::node::NodeId;

#[derive(Debug, Clone, PartialEq)]
enum SelectorPart {
    Tag(String),
    Id(String),
    Class(String),
    AttrPresent(String),
    AttrEquals(String, String),
}

fn parse_selector(sel: &str) -> Vec<SelectorPart> {
    let mut parts = Vec::new();
    let mut rest = sel.trim();

    while !rest.is_empty() {
        let (part, remaining) = match rest.as_bytes()[0] {
            b'#' => {
                let end = find_part_end(&rest[1..]);
                (SelectorPart::Id(rest[1..end + 1].to_string()), &rest[end + 1..])
            }
            b'.' => {
                let end = find_part_end(&rest[1..]);
                (
                    SelectorPart::Class(rest[1..end + 1].to_string()),
                    &rest[end + 1..],
                )
            }
            b'[' => match rest.find(']') {
                Some(close) => {
                    let inner = &rest[1..close];
                    let part = match inner.split_once('=') {
                        Some((name, value)) => SelectorPart::AttrEquals(
                            name.trim().to_string(),
                            value.trim().trim_matches(|c| c == '"' || c == '\'').to_string(),
                        ),
                        None => SelectorPart::AttrPresent(inner.trim().to_string()),
                    };
                    (part, &rest[close + 1..])
                }
                None => break,
            },
            _ => {
                let end = find_part_end(rest);
                (SelectorPart::Tag(rest[..end].to_string()), &rest[end..])
            }
        };
        parts.push(part);
        rest = remaining;
    }

    parts
}

/// Length of a bare identifier prefix.
fn find_part_end(s: &str) -> usize {
    s.find(['#', '.', '[']).unwrap_or(s.len())
}

/// True when the element matches every part of the compound selector.
pub fn matches(doc: &Document, node: NodeId, sel: &str) -> bool {
    let Some(tag) = doc.tag(node) else {
        return false;
    };

    let parts = parse_selector(sel);
    if parts.is_empty() {
        return false;
    }

    parts.iter().all(|part| match part {
        SelectorPart::Tag(t) => tag.eq_ignore_ascii_case(t),
        SelectorPart::Id(id) => doc.attribute(node, "id").as_deref() == Some(id.as_str()),
        SelectorPart::Class(class) => doc
            .attribute(node, "class")
            .is_some_and(|v| v.split_ascii_whitespace().any(|c| c == class)),
        SelectorPart::AttrPresent(name) => doc.has_attribute(node, name),
        SelectorPart::AttrEquals(name, value) => {
            doc.attribute(node, name).as_deref() == Some(value.as_str())
        }
    })
}

/// First matching element in document order, starting below `root`.
pub fn query_selector(doc: &Document, root: NodeId, sel: &str) -> Option<NodeId> {
    let mut stack: Vec<NodeId> = doc.children(root);
    stack.reverse();

    while let Some(node) = stack.pop() {
        if doc.is_element(node) && matches(doc, node, sel) {
            return Some(node);
        }
        let mut children = doc.children(node);
        children.reverse();
        stack.extend(children);
    }
    None
}

// =============================================================================
// Tests
// =============================================================================
