//! Node data for the arena document.
//!
//! Nodes are indices into the document's arena rather than owned objects;
//! identity is the index, which stays stable across re-parenting. This is
//! what anchored replacement and the streaming diff lean on.

use std::rc::Rc;

use bitflags::bitflags;
use indexmap::IndexMap;
use serde_json::Value;

/// Handle to a node in a [`Document`](super::document::Document) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

bitflags! {
    /// Per-node flag word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NodeFlags: u32 {
        /// Node was created in the SVG namespace.
        const SVG = 1 << 0;
        /// Node is a shadow root container.
        const SHADOW_ROOT = 1 << 1;
    }
}

/// A platform event delivered to listeners.
///
/// Custom events carry a structured `detail` payload; native events do not.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub detail: Option<Value>,
    pub target: Option<NodeId>,
}

impl Event {
    pub fn native(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            detail: None,
            target: None,
        }
    }

    pub fn custom(name: impl Into<String>, detail: Value) -> Self {
        Self {
            name: name.into(),
            detail: Some(detail),
            target: None,
        }
    }

    pub fn is_custom(&self) -> bool {
        self.detail.is_some()
    }
}

/// Platform-level event listener.
pub type EventListener = Rc<dyn Fn(&Event)>;

/// What a node is.
pub enum NodeKind {
    /// The document root or a shadow root.
    Root,
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
        listeners: Vec<(String, EventListener)>,
    },
    Text(String),
    Comment(String),
}

/// One arena slot.
pub(crate) struct NodeData {
    pub kind: NodeKind,
    pub flags: NodeFlags,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Shadow root attached to this element, if any.
    pub shadow_root: Option<NodeId>,
    /// Host element, set on shadow-root nodes.
    pub host: Option<NodeId>,
}

impl NodeData {
    pub fn new(kind: NodeKind, flags: NodeFlags) -> Self {
        Self {
            kind,
            flags,
            parent: None,
            children: Vec::new(),
            shadow_root: None,
            host: None,
        }
    }
}

/// A stylesheet visible to the document.
///
/// `accessible` mirrors the host platform's same-origin rule: rules of an
/// inaccessible sheet can only be referenced by href.
#[derive(Debug, Clone)]
pub struct StyleSheet {
    pub rules: Vec<String>,
    pub href: Option<String>,
    pub accessible: bool,
}

impl StyleSheet {
    pub fn inline(rules: Vec<String>) -> Self {
        Self {
            rules,
            href: None,
            accessible: true,
        }
    }

    pub fn external(href: impl Into<String>, rules: Vec<String>, accessible: bool) -> Self {
        Self {
            rules,
            href: Some(href.into()),
            accessible,
        }
    }

    /// Concatenated rule text.
    pub fn css_text(&self) -> String {
        self.rules.concat()
    }
}
