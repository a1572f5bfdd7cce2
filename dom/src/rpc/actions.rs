//! Action dependency records.
//!
//! Elements wired to remote calls carry `data-action-<event>` attributes
//! (and the owning component's `data-cid`). The streaming diff re-emits
//! them onto patched elements so freshly inserted markup stays wireable to
//! pending remote calls.

use crate::dom::{Document, NodeId};

pub const ACTION_PREFIX: &str = "data-action-";
pub const CID_ATTRIBUTE: &str = "data-cid";

/// One (event-name, remote-call-id, component-id) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub event: String,
    pub action_id: String,
    pub component_id: Option<String>,
}

/// Parse the records attached to an element, in attribute order.
pub fn records_for(doc: &Document, node: NodeId) -> Vec<ActionRecord> {
    let component_id = doc.attribute(node, CID_ATTRIBUTE);
    doc.attributes(node)
        .into_iter()
        .filter_map(|(name, value)| {
            name.strip_prefix(ACTION_PREFIX).map(|event| ActionRecord {
                event: event.to_string(),
                action_id: value,
                component_id: component_id.clone(),
            })
        })
        .collect()
}

/// True for attributes that carry action wiring.
pub fn is_action_attribute(name: &str) -> bool {
    name.starts_with(ACTION_PREFIX) || name == CID_ATTRIBUTE
}

/// Re-emit the records of `from` onto `to` where the new markup lacks them.
pub fn preserve(doc: &Document, from: NodeId, to: NodeId) {
    for (name, value) in doc.attributes(from) {
        if is_action_attribute(&name) && !doc.has_attribute(to, &name) {
            doc.set_attribute(to, &name, &value);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
