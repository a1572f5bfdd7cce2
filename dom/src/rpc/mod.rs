//! Remote-update protocol client.
//!
//! Consumes the response of a server round-trip triggered by a user action
//! and applies it to the page: form reset, store merge (or stash),
//! navigation, or a streamed HTML patch against a targeted subtree.
//!
//! Navigate and patch are mutually exclusive by construction — navigation
//! returns before the patch path is considered. Everything else combines.

pub mod actions;
pub mod diff;
pub mod response;

use std::cell::RefCell;
use std::rc::Rc;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tracing::debug;

use crate::dom::{Document, Event, NodeId};
use crate::error::RpcError;
use crate::session::{RenderMode, SessionContext};

use diff::{stream_diff, DiffOptions};
use response::{collect_body, BodyStream, Response};

// Bit-exact header names of the update protocol.
pub const HEADER_NAVIGATE: &str = "X-Navigate";
pub const HEADER_MODE: &str = "X-Mode";
pub const HEADER_TYPE: &str = "X-Type";
pub const HEADER_TARGET: &str = "X-Target";
pub const HEADER_PLACEMENT: &str = "X-Placement";
pub const HEADER_CID: &str = "X-Cid";
pub const HEADER_RESET: &str = "X-Reset";

/// `X-Type` / `X-Target` sentinel for the whole-component path.
const COMPONENT: &str = "component";

/// Identifier of store-transfer payload nodes embedded in markup.
const STORE_TRANSFER_ID: &str = "S";

/// What triggered the remote call.
///
/// A form-submission caller can force the render mode; that explicit mode
/// wins over the response header for the transition flag, while the header
/// stays authoritative for the navigation mode label.
#[derive(Default)]
pub struct Invocation {
    /// Events of the triggering action; the first one's target receives
    /// the form reset.
    pub events: Vec<Event>,

    /// Caller-forced render mode, when the caller is a submission handler.
    pub mode: Option<RenderMode>,
}

impl Invocation {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_event(event: Event) -> Self {
        Self {
            events: vec![event],
            mode: None,
        }
    }

    pub fn with_mode(mode: RenderMode) -> Self {
        Self {
            events: Vec::new(),
            mode: Some(mode),
        }
    }
}

pub struct ProtocolClient {
    doc: Rc<Document>,
    session: Rc<SessionContext>,
}

impl ProtocolClient {
    pub fn new(doc: Rc<Document>, session: Rc<SessionContext>) -> Self {
        Self { doc, session }
    }

    /// Apply one server response.
    ///
    /// `dataset_cid` is the triggering element's `data-cid`, the fallback
    /// when the response carries no `X-Cid`.
    pub async fn resolve(
        &self,
        mut res: Response,
        dataset_cid: Option<String>,
        invocation: Invocation,
    ) -> Result<(), RpcError> {
        let mode: Option<RenderMode> = res.header(HEADER_MODE).and_then(|m| m.parse().ok());
        let is_component_rerender =
            res.header(HEADER_TYPE).as_deref() == Some(COMPONENT);
        let target = res.header(HEADER_TARGET);
        let placement = res
            .header(HEADER_PLACEMENT)
            .unwrap_or_else(|| "replace".to_string());
        let url_to_navigate = res.header(HEADER_NAVIGATE);
        let component_id = res.header(HEADER_CID).or(dataset_cid);
        let transition =
            invocation.mode == Some(RenderMode::Transition) || mode == Some(RenderMode::Transition);

        // Form reset comes before anything else touches the page.
        if res.has_header(HEADER_RESET) {
            if let Some(form) = invocation.events.first().and_then(|e| e.target) {
                self.doc.reset_form(form);
            }
        }

        if res.content_type_includes("json") {
            if let Some(body) = res.take_body() {
                let bytes = collect_body(body).await.map_err(RpcError::Body)?;
                let pairs: Vec<(String, Value)> = serde_json::from_slice(&bytes)?;
                self.session.update_store(pairs);
            }
        }

        // Navigation is terminal for this invocation.
        if let Some(url) = url_to_navigate {
            debug!(url = %url, "navigate disposition");
            self.session.navigate(&url, mode);
            return Ok(());
        }

        if res.content_type_includes("html") {
            let Some(body) = res.take_body() else {
                return Ok(());
            };

            let doc_stream = if is_component_rerender {
                self.synthetic_document_stream(body, component_id.as_deref(), target.as_deref(), &placement)
            } else {
                body
            };

            // Store-transfer nodes are consumed here, never diffed in; a
            // decode failure inside the walk surfaces after it.
            let skip_error: Rc<RefCell<Option<serde_json::Error>>> = Rc::new(RefCell::new(None));
            let session = self.session.clone();
            let skip_error_in = skip_error.clone();
            let should_skip = Box::new(move |doc: &Document, node: NodeId| {
                if doc.attribute(node, "id").as_deref() != Some(STORE_TRANSFER_ID) {
                    return false;
                }
                match serde_json::from_str::<Vec<(String, Value)>>(&doc.text_content(node)) {
                    Ok(pairs) => session.update_store(pairs),
                    Err(err) => *skip_error_in.borrow_mut() = Some(err),
                }
                true
            });

            let session = self.session.clone();
            let on_next_node = Box::new(move |doc: &Document, node: NodeId| {
                if doc.tag(node).is_some_and(|t| t.eq_ignore_ascii_case("script")) {
                    let source = doc
                        .attribute(node, "src")
                        .unwrap_or_else(|| doc.text_content(node));
                    session.record_script(source);
                }
            });

            stream_diff(
                &self.doc,
                doc_stream,
                DiffOptions {
                    on_next_node: Some(on_next_node),
                    transition,
                    should_skip: Some(should_skip),
                },
            )
            .await?;

            if let Some(err) = skip_error.borrow_mut().take() {
                return Err(RpcError::Decode(err));
            }

            // Sequence follow-up work after the visual transition settles.
            if let Some(finished) = self.session.take_transition() {
                let _ = finished.await;
            }
        }

        Ok(())
    }

    /// Assemble the synthetic document stream for a component re-render:
    /// live markup up to the target region, then the response body, then
    /// the live markup after it.
    fn synthetic_document_stream(
        &self,
        body: BodyStream,
        component_id: Option<&str>,
        target: Option<&str>,
        placement: &str,
    ) -> BodyStream {
        let cid = component_id.unwrap_or_default();
        let mut start_text = format!("<!--o:{cid}-->");
        let mut end_text = format!("<!--c:{cid}-->");

        let same_target = target.is_none() || target == Some(COMPONENT);
        if !same_target {
            let selector = target.unwrap_or_default();
            let is_replace = placement.starts_with('r');

            match self.doc.query_selector(selector) {
                Some(element) => {
                    // Non-replacing placements splice at an empty anchor
                    // element inserted at the requested position.
                    let region = if is_replace {
                        element
                    } else {
                        let anchor = self.doc.create_element(COMPONENT);
                        self.place(element, anchor, placement);
                        anchor
                    };
                    let markup = self.doc.outer_html(region);
                    start_text = markup.clone();
                    end_text = markup;
                }
                None => {
                    // Not an error: degrade to the whole-component path.
                    debug!(selector, "patch target missing, using whole-component diff");
                }
            }
        }

        let markup = self.doc.document_markup();
        let prefix = markup
            .split(&start_text)
            .next()
            .unwrap_or_default()
            .to_string();
        let suffix = markup
            .splitn(2, &end_text)
            .nth(1)
            .unwrap_or_default()
            .to_string();

        stream::iter(vec![Ok(prefix.into_bytes())])
            .chain(body)
            .chain(stream::iter(vec![Ok(suffix.into_bytes())]))
            .boxed_local()
    }

    fn place(&self, reference: NodeId, node: NodeId, placement: &str) {
        let doc = &self.doc;
        match placement {
            "prepend" => {
                let first = doc.first_child(reference);
                doc.insert_before(reference, node, first);
            }
            "before" => {
                if let Some(parent) = doc.parent(reference) {
                    doc.insert_before(parent, node, Some(reference));
                }
            }
            "after" => {
                if let Some(parent) = doc.parent(reference) {
                    let next = doc.next_sibling(reference);
                    doc.insert_before(parent, node, next);
                }
            }
            // append is the default for non-replacing placements
            _ => doc.append(reference, node),
        }
    }
}
