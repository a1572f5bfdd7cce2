//! # cinder-dom
//!
//! Reactive DOM runtime for cinder web components.
//!
//! Built on [cinder-signals](../cinder_signals/index.html) for fine-grained
//! reactivity: components mount a declarative UI description directly into
//! live nodes — no virtual-DOM diff pass — and server-action responses
//! patch exactly the subtree that changed.
//!
//! ## Architecture
//!
//! ```text
//! ElementDefinition → ElementInstance (connect) → Mounter → dom::Document
//!                                                    ↑
//! ProtocolClient (server response) → streaming diff ─┘
//! ```
//!
//! - [`dom`] - The DOM-like platform: arena document, parser, serializer,
//!   selector matching
//! - [`render`] - Mount engine and the tagged UI description it consumes
//! - [`element`] - Custom-element instance lifecycle
//! - [`rpc`] - Remote-update protocol client (store merge, navigation,
//!   streamed HTML patch)
//! - [`session`] - Session-scoped context: shared store, navigation record,
//!   transition handle, path rewriting

pub mod dom;
pub mod element;
pub mod error;
pub mod render;
pub mod rpc;
pub mod session;

// Re-export commonly used items
pub use dom::{Document, Event, NodeId, StyleSheet};
pub use element::{
    CustomElementCallbacks, ElementDefinition, ElementInstance, Props, WebContext,
};
pub use error::{MountError, RpcError};
pub use render::{AttrValue, Children, Mounter, PathConfig, UiNode};
pub use rpc::{Invocation, ProtocolClient};
pub use rpc::response::Response;
pub use session::{RenderMode, SessionContext, TransitionGuard};
