//! The arena document.
//!
//! A single growable arena owns every node; handles are indices. Mutation
//! goes through `&self` methods with interior mutability so the mount
//! engine, event handlers and the protocol client can all hold the same
//! `Rc<Document>`.
//!
//! Listener dispatch clones the listener list out of the arena before
//! invoking anything, so handlers are free to mutate the tree.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::node::{Event, EventListener, NodeData, NodeFlags, NodeId, NodeKind, StyleSheet};
use super::parser;
use super::selector;
use super::serialize;

const SVG_TAG: &str = "svg";
const FOREIGN_OBJECT: &str = "foreignObject";

pub struct Document {
    nodes: RefCell<Vec<NodeData>>,
    root: NodeId,
    style_sheets: RefCell<Vec<StyleSheet>>,
    adopted: RefCell<HashMap<NodeId, Vec<StyleSheet>>>,
}

impl Document {
    pub fn new() -> Rc<Self> {
        let root = NodeData::new(NodeKind::Root, NodeFlags::empty());
        Rc::new(Self {
            nodes: RefCell::new(vec![root]),
            root: NodeId(0),
            style_sheets: RefCell::new(Vec::new()),
            adopted: RefCell::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn alloc(&self, data: NodeData) -> NodeId {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(data);
        NodeId(nodes.len() - 1)
    }

    fn with_node<R>(&self, node: NodeId, f: impl FnOnce(&NodeData) -> R) -> R {
        f(&self.nodes.borrow()[node.0])
    }

    fn with_node_mut<R>(&self, node: NodeId, f: impl FnOnce(&mut NodeData) -> R) -> R {
        f(&mut self.nodes.borrow_mut()[node.0])
    }

    // =========================================================================
    // Creation
    // =========================================================================

    /// Create an element, inheriting the SVG namespace from the parent.
    ///
    /// An `svg` tag enters the namespace; descendants stay in it until a
    /// `foreignObject` boundary, mirroring the host platform rule.
    pub fn create_element_in(&self, tag: &str, parent: Option<NodeId>) -> NodeId {
        let parent_svg = parent.is_some_and(|p| {
            self.with_node(p, |data| {
                data.flags.contains(NodeFlags::SVG)
                    && !matches!(&data.kind, NodeKind::Element { tag, .. } if tag.eq_ignore_ascii_case(FOREIGN_OBJECT))
            })
        });

        let flags = if tag == SVG_TAG || parent_svg {
            NodeFlags::SVG
        } else {
            NodeFlags::empty()
        };

        self.alloc(NodeData::new(
            NodeKind::Element {
                tag: tag.to_string(),
                attributes: indexmap::IndexMap::new(),
                listeners: Vec::new(),
            },
            flags,
        ))
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.create_element_in(tag, None)
    }

    pub fn create_text(&self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::new(NodeKind::Text(text.into()), NodeFlags::empty()))
    }

    pub fn create_comment(&self, text: impl Into<String>) -> NodeId {
        self.alloc(NodeData::new(
            NodeKind::Comment(text.into()),
            NodeFlags::empty(),
        ))
    }

    // =========================================================================
    // Tree structure
    // =========================================================================

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.with_node(node, |data| data.parent)
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.with_node(node, |data| data.children.clone())
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.with_node(node, |data| data.children.first().copied())
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        self.with_node(parent, |data| {
            let pos = data.children.iter().position(|&c| c == node)?;
            data.children.get(pos + 1).copied()
        })
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        self.with_node(parent, |data| {
            let pos = data.children.iter().position(|&c| c == node)?;
            if pos == 0 {
                None
            } else {
                data.children.get(pos - 1).copied()
            }
        })
    }

    /// Detach a node from its parent. Tolerates already-detached nodes.
    pub fn detach(&self, node: NodeId) {
        let parent = self.with_node_mut(node, |data| data.parent.take());
        if let Some(parent) = parent {
            self.with_node_mut(parent, |data| data.children.retain(|&c| c != node));
        }
    }

    pub fn append(&self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.with_node_mut(child, |data| data.parent = Some(parent));
        self.with_node_mut(parent, |data| data.children.push(child));
    }

    /// Insert `child` into `parent` immediately before `reference`
    /// (append when the reference is gone).
    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.detach(child);
        self.with_node_mut(child, |data| data.parent = Some(parent));
        self.with_node_mut(parent, |data| {
            let pos = reference.and_then(|r| data.children.iter().position(|&c| c == r));
            match pos {
                Some(pos) => data.children.insert(pos, child),
                None => data.children.push(child),
            }
        });
    }

    pub fn clear_children(&self, node: NodeId) {
        let children = self.with_node_mut(node, |data| std::mem::take(&mut data.children));
        for child in children {
            self.with_node_mut(child, |data| data.parent = None);
        }
    }

    /// True when `node` is `ancestor` or inside its subtree.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }

    // =========================================================================
    // Node queries
    // =========================================================================

    pub fn is_element(&self, node: NodeId) -> bool {
        self.with_node(node, |data| matches!(data.kind, NodeKind::Element { .. }))
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        self.with_node(node, |data| matches!(data.kind, NodeKind::Text(_)))
    }

    pub fn is_comment(&self, node: NodeId) -> bool {
        self.with_node(node, |data| matches!(data.kind, NodeKind::Comment(_)))
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.with_node(node, |data| match &data.kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            _ => None,
        })
    }

    pub fn is_svg(&self, node: NodeId) -> bool {
        self.with_node(node, |data| data.flags.contains(NodeFlags::SVG))
    }

    /// Text of a text or comment node.
    pub fn node_text(&self, node: NodeId) -> Option<String> {
        self.with_node(node, |data| match &data.kind {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text.clone()),
            _ => None,
        })
    }

    pub fn set_node_text(&self, node: NodeId, text: impl Into<String>) {
        self.with_node_mut(node, |data| match &mut data.kind {
            NodeKind::Text(t) | NodeKind::Comment(t) => *t = text.into(),
            _ => {}
        });
    }

    /// Concatenated text of the subtree (elements), or the node's own text.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let (text, children) = self.with_node(node, |data| match &data.kind {
            NodeKind::Text(text) => (Some(text.clone()), Vec::new()),
            NodeKind::Comment(_) => (None, Vec::new()),
            _ => (None, data.children.clone()),
        });
        if let Some(text) = text {
            out.push_str(&text);
        }
        for child in children {
            self.collect_text(child, out);
        }
    }

    /// Replace an element's content with a single text node.
    pub fn set_text_content(&self, node: NodeId, text: impl Into<String>) {
        self.clear_children(node);
        let text_node = self.create_text(text);
        self.append(node, text_node);
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.with_node(node, |data| match &data.kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).cloned(),
            _ => None,
        })
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.with_node(node, |data| match &data.kind {
            NodeKind::Element { attributes, .. } => attributes.contains_key(name),
            _ => false,
        })
    }

    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.with_node(node, |data| match &data.kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            _ => Vec::new(),
        })
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        self.with_node_mut(node, |data| {
            if let NodeKind::Element { attributes, .. } = &mut data.kind {
                attributes.insert(name.to_string(), value.to_string());
            }
        });
    }

    /// Namespace-aware attribute set; the arena keys namespaced attributes
    /// by their prefixed name.
    pub fn set_attribute_ns(&self, node: NodeId, name: &str, value: &str) {
        self.set_attribute(node, name, value);
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        self.with_node_mut(node, |data| {
            if let NodeKind::Element { attributes, .. } = &mut data.kind {
                attributes.shift_remove(name);
            }
        });
    }

    pub fn remove_attribute_ns(&self, node: NodeId, name: &str) {
        self.remove_attribute(node, name);
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn add_event_listener(&self, node: NodeId, name: &str, listener: EventListener) {
        self.with_node_mut(node, |data| {
            if let NodeKind::Element { listeners, .. } = &mut data.kind {
                listeners.push((name.to_string(), listener));
            }
        });
    }

    /// Dispatch an event to the target's listeners.
    pub fn dispatch(&self, node: NodeId, event: &Event) {
        let matching: Vec<EventListener> = self.with_node(node, |data| match &data.kind {
            NodeKind::Element { listeners, .. } => listeners
                .iter()
                .filter(|(name, _)| *name == event.name)
                .map(|(_, l)| l.clone())
                .collect(),
            _ => Vec::new(),
        });

        let mut event = event.clone();
        event.target = Some(node);
        for listener in matching {
            listener(&event);
        }
    }

    // =========================================================================
    // Shadow roots and stylesheets
    // =========================================================================

    /// Attach a shadow root to a host, or return the existing one.
    pub fn attach_shadow(&self, host: NodeId) -> NodeId {
        if let Some(existing) = self.shadow_root(host) {
            return existing;
        }
        let shadow = self.alloc(NodeData::new(NodeKind::Root, NodeFlags::SHADOW_ROOT));
        self.with_node_mut(shadow, |data| data.host = Some(host));
        self.with_node_mut(host, |data| data.shadow_root = Some(shadow));
        shadow
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.with_node(host, |data| data.shadow_root)
    }

    pub fn host(&self, shadow: NodeId) -> Option<NodeId> {
        self.with_node(shadow, |data| data.host)
    }

    pub fn add_style_sheet(&self, sheet: StyleSheet) {
        self.style_sheets.borrow_mut().push(sheet);
    }

    pub fn style_sheets(&self) -> Vec<StyleSheet> {
        self.style_sheets.borrow().clone()
    }

    pub fn adopt_sheet(&self, shadow: NodeId, sheet: StyleSheet) {
        self.adopted.borrow_mut().entry(shadow).or_default().push(sheet);
    }

    pub fn adopted_sheets(&self, shadow: NodeId) -> Vec<StyleSheet> {
        self.adopted.borrow().get(&shadow).cloned().unwrap_or_default()
    }

    // =========================================================================
    // Forms
    // =========================================================================

    /// Reset form controls in the subtree: values, checks and selections go
    /// back to their unset state.
    pub fn reset_form(&self, form: NodeId) {
        let mut stack = vec![form];
        while let Some(node) = stack.pop() {
            if let Some(tag) = self.tag(node) {
                if tag == "input" || tag == "textarea" {
                    self.remove_attribute(node, "value");
                    self.remove_attribute(node, "checked");
                } else if tag == "option" {
                    self.remove_attribute(node, "selected");
                }
            }
            stack.extend(self.children(node));
        }
    }

    // =========================================================================
    // Markup, selection
    // =========================================================================

    /// Serialize one node to markup.
    pub fn outer_html(&self, node: NodeId) -> String {
        serialize::outer_html(self, node)
    }

    /// Serialize the whole document (root children).
    pub fn document_markup(&self) -> String {
        serialize::document_markup(self)
    }

    /// Parse markup and append the resulting nodes to a parent.
    pub fn append_html(&self, parent: NodeId, html: &str) {
        parser::parse_into(self, parent, html);
    }

    /// First element in document order matching a simple CSS selector.
    pub fn query_selector(&self, sel: &str) -> Option<NodeId> {
        selector::query_selector(self, self.root, sel)
    }

    pub fn matches_selector(&self, node: NodeId, sel: &str) -> bool {
        selector::matches(self, node, sel)
    }
}

// =============================================================================
// Tests
// =============================================================================
