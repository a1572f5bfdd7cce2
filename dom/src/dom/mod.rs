//! The DOM-like platform the runtime renders into.
//!
//! An arena-indexed document models the subset of the host platform the
//! mount engine and protocol client consume: element creation (including
//! SVG namespace inheritance), attributes, event listeners, shadow roots
//! with adopted stylesheets, markup parse/serialize, and simple selector
//! matching.

pub mod document;
pub mod node;
pub mod parser;
pub mod selector;
pub mod serialize;

pub use document::Document;
pub use node::{Event, EventListener, NodeFlags, NodeId, StyleSheet};
pub use parser::{HtmlToken, StreamingBuilder, Tokenizer};
