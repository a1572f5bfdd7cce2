//! Streaming diff of a document stream against the live tree.
//!
//! The incoming markup parses incrementally into a detached staging tree as
//! chunks arrive; the walk then patches the live document node-by-node:
//! matching nodes are kept (attributes and text updated in place, children
//! recursed), mismatches are replaced, excess live nodes are removed. Kept
//! nodes keep their identity, so reactive subscriptions elsewhere on the
//! page survive the patch untouched.

use std::rc::Rc;

use futures::StreamExt;
use tracing::debug;

use super::actions;
use super::response::BodyStream;
use crate::dom::parser::StreamingBuilder;
use crate::dom::{Document, NodeId};
use crate::error::RpcError;

/// Hook run for every node taken from the incoming stream.
pub type LoadHook = Box<dyn Fn(&Document, NodeId)>;

/// Predicate intercepting nodes that must never be diffed into the DOM.
pub type SkipPredicate = Box<dyn FnMut(&Document, NodeId) -> bool>;

pub struct DiffOptions {
    /// Called per incoming node (script execution lives here).
    pub on_next_node: Option<LoadHook>,

    /// Whether this patch runs under a page transition.
    pub transition: bool,

    /// Intercepts store-transfer payloads and the like.
    pub should_skip: Option<SkipPredicate>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            on_next_node: None,
            transition: false,
            should_skip: None,
        }
    }
}

/// Apply a document stream onto the live document.
pub async fn stream_diff(
    doc: &Rc<Document>,
    mut stream: BodyStream,
    mut opts: DiffOptions,
) -> Result<(), RpcError> {
    debug!(transition = opts.transition, "applying streamed patch");

    // Stage the incoming tree as chunks arrive.
    let staging = doc.create_element("stream");
    {
        let mut builder = StreamingBuilder::new(doc, staging);
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(RpcError::Body)?;
            builder.push_chunk(&String::from_utf8_lossy(&chunk));
        }
        builder.finish();
    }

    diff_children(doc, doc.root(), staging, &mut opts);
    Ok(())
}

fn notify(opts: &DiffOptions, doc: &Document, node: NodeId) {
    if let Some(hook) = &opts.on_next_node {
        hook(doc, node);
    }
}

/// Walk one level: incoming children against live children, in order.
fn diff_children(doc: &Document, live_parent: NodeId, new_parent: NodeId, opts: &mut DiffOptions) {
    let new_children = doc.children(new_parent);
    let mut live_children = doc.children(live_parent);
    let mut idx = 0;

    for new_child in new_children {
        if let Some(skip) = opts.should_skip.as_mut() {
            if skip(doc, new_child) {
                // Intercepted: consumed by the caller, never enters the DOM.
                doc.detach(new_child);
                continue;
            }
        }

        match live_children.get(idx).copied() {
            None => {
                doc.append(live_parent, new_child);
                notify_subtree(opts, doc, new_child);
            }
            Some(live_child) => {
                if same_shape(doc, live_child, new_child) {
                    patch_node(doc, live_child, new_child, opts);
                } else {
                    if doc.is_element(live_child) && doc.is_element(new_child) {
                        actions::preserve(doc, live_child, new_child);
                    }
                    doc.insert_before(live_parent, new_child, Some(live_child));
                    doc.detach(live_child);
                    live_children[idx] = new_child;
                    notify_subtree(opts, doc, new_child);
                }
                idx += 1;
            }
        }
    }

    for &leftover in &live_children[idx..] {
        doc.detach(leftover);
    }
}

/// Nodes diff in place when they are the same kind of thing.
fn same_shape(doc: &Document, a: NodeId, b: NodeId) -> bool {
    match (doc.tag(a), doc.tag(b)) {
        (Some(ta), Some(tb)) => ta.eq_ignore_ascii_case(&tb),
        (None, None) => {
            (doc.is_text(a) && doc.is_text(b)) || (doc.is_comment(a) && doc.is_comment(b))
        }
        _ => false,
    }
}

/// Update a kept node from its incoming counterpart.
fn patch_node(doc: &Document, live: NodeId, incoming: NodeId, opts: &mut DiffOptions) {
    if doc.is_text(live) || doc.is_comment(live) {
        let new_text = doc.node_text(incoming).unwrap_or_default();
        if doc.node_text(live).as_deref() != Some(new_text.as_str()) {
            doc.set_node_text(live, new_text);
        }
        return;
    }

    patch_attributes(doc, live, incoming);
    notify(opts, doc, live);
    diff_children(doc, live, incoming, opts);
}

/// Write incoming attributes over the live ones; stale attributes drop,
/// except action wiring, which is re-emitted so patched markup stays
/// wireable.
fn patch_attributes(doc: &Document, live: NodeId, incoming: NodeId) {
    for (name, value) in doc.attributes(incoming) {
        if doc.attribute(live, &name).as_deref() != Some(value.as_str()) {
            doc.set_attribute(live, &name, &value);
        }
    }

    for (name, _) in doc.attributes(live) {
        if !doc.has_attribute(incoming, &name) && !actions::is_action_attribute(&name) {
            doc.remove_attribute(live, &name);
        }
    }
}

/// Run the load hook over a freshly adopted subtree.
fn notify_subtree(opts: &DiffOptions, doc: &Document, node: NodeId) {
    notify(opts, doc, node);
    for child in doc.children(node) {
        notify_subtree(opts, doc, child);
    }
}

// =============================================================================
// Tests
// =============================================================================
