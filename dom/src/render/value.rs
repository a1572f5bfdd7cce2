//! The compiled UI description consumed by the mount engine.
//!
//! The compile stage emits an explicit tagged union per value instead of a
//! shape the runtime would have to probe. The invariant holds by
//! construction: content is reactive if and only if it is the `Dyn`
//! variant; everything else is written once and never re-subscribed.

use std::rc::Rc;

use cinder_signals::State;
use futures::future::LocalBoxFuture;
use serde_json::Value;

use crate::dom::{Event, NodeId};

/// What an event handler receives: the native event, or — for custom
/// events — just the detail payload.
pub enum EventArg<'a> {
    Native(&'a Event),
    Detail(&'a Value),
}

/// Component-level event handler.
pub type EventHandler = Rc<dyn for<'a> Fn(EventArg<'a>)>;

/// Reactive attribute thunk.
pub type DynAttr = Rc<dyn Fn() -> AttrValue>;

/// Reactive children thunk.
pub type DynChildren = Rc<dyn Fn() -> Children>;

/// Future resolving to children (suspended subtree).
pub type ChildFuture = LocalBoxFuture<'static, Children>;

/// An attribute value in the UI description.
pub enum AttrValue {
    /// Written once with `set_attribute`.
    Static(String),
    /// Boolean presence sentinel: attribute present without a value.
    On,
    /// Boolean absence sentinel: attribute removed.
    Off,
    /// Re-evaluated inside an effect; the sole reactive attribute path.
    Dyn(DynAttr),
    /// Event listener (attribute name starts with `on`).
    Handler(EventHandler),
    /// Receives the mounted node.
    Ref(State<Option<NodeId>>),
    /// Request-indicator binding; toggles the request class.
    Indicator(State<bool>),
}

impl AttrValue {
    pub fn handler(f: impl for<'a> Fn(EventArg<'a>) + 'static) -> Self {
        Self::Handler(Rc::new(f))
    }

    pub fn dynamic(f: impl Fn() -> AttrValue + 'static) -> Self {
        Self::Dyn(Rc::new(f))
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Static(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Static(value)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        if value {
            Self::On
        } else {
            Self::Off
        }
    }
}

/// One node of the UI description: the ordered (tag, attributes, children)
/// triple. A `None` tag is a fragment mounting into its parent.
pub struct UiNode {
    pub tag: Option<String>,
    pub attrs: Vec<(String, AttrValue)>,
    pub children: Children,
}

impl UiNode {
    pub fn element(
        tag: impl Into<String>,
        attrs: Vec<(String, AttrValue)>,
        children: Children,
    ) -> Self {
        Self {
            tag: Some(tag.into()),
            attrs,
            children,
        }
    }

    pub fn fragment(children: Children) -> Self {
        Self {
            tag: None,
            attrs: Vec::new(),
            children,
        }
    }
}

/// Children of a UI node.
pub enum Children {
    Empty,
    /// A single text node.
    Text(String),
    /// Booleans render as text; `false` coerces to the empty string.
    Bool(bool),
    /// Multiple text fragments joined without separator into one node.
    TextParts(Vec<String>),
    /// One nested subtree.
    Node(Box<UiNode>),
    /// Sibling fragments, mounted concurrently.
    List(Vec<UiNode>),
    /// Reactive content: re-computed in an effect with anchored replacement.
    Dyn(DynChildren),
    /// Suspended subtree; materializes when the future resolves.
    Pending(ChildFuture),
    /// Pre-rendered markup appended verbatim. The caller owns sanitization.
    RawHtml(String),
    /// Shadow-DOM projection point.
    Slot,
    /// Render into another target node instead of the current parent.
    Portal {
        target: NodeId,
        child: Box<Children>,
    },
}

impl Children {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn node(node: UiNode) -> Self {
        Self::Node(Box::new(node))
    }

    pub fn dynamic(f: impl Fn() -> Children + 'static) -> Self {
        Self::Dyn(Rc::new(f))
    }

    /// Text rendition of the non-subtree variants.
    pub fn coerce_text(&self) -> Option<String> {
        match self {
            Self::Empty => Some(String::new()),
            Self::Text(text) => Some(text.clone()),
            Self::Bool(false) => Some(String::new()),
            Self::Bool(true) => Some("true".to_string()),
            Self::TextParts(parts) => Some(parts.concat()),
            _ => None,
        }
    }
}

impl From<&str> for Children {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Children {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

// =============================================================================
// Tests
// =============================================================================
