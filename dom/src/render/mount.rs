//! The mount engine.
//!
//! Materializes a [`UiNode`] description into arena nodes inside one
//! component's shadow root, wiring attributes, events and children to the
//! reactive graph. Static content is written once; `Dyn` values get an
//! effect each; a `Pending` child suspends only its own subtree.
//!
//! Reactive children re-render through **anchored replacement**: the effect
//! remembers the node range it inserted, finds the first of those nodes
//! still attached under the parent, inserts the new content before the old
//! range, and only then removes the old nodes (last one after everything
//! else is in place). The DOM never shows an empty gap, and nodes inserted
//! by unrelated effects sharing the parent are left alone.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll};

use cinder_signals::Scope;
use futures::executor::LocalSpawner;
use futures::future::{join_all, LocalBoxFuture};
use futures::task::LocalSpawnExt;
use futures::FutureExt;

use crate::dom::{Document, Event, NodeId};
use crate::render::value::{AttrValue, ChildFuture, Children, DynChildren, EventArg, UiNode};
use crate::session::SessionContext;

/// Class toggled on elements bound to a request indicator.
pub const REQUEST_CLASS: &str = "cinder-request";

/// One scoped-css block: lazily evaluated so css built from reactive values
/// re-renders with them.
pub type CssBlock = Rc<dyn Fn() -> String>;

/// Tag of the throwaway container dynamic content renders into before the
/// anchored swap.
const CONTEXT_TAG: &str = "context";

pub struct Mounter {
    doc: Rc<Document>,
    session: Rc<SessionContext>,
    scope: Scope,
    /// The component's shadow root; also the fallback insertion parent when
    /// an anchor's container got detached.
    root: NodeId,
    spawner: LocalSpawner,
    css_blocks: Rc<RefCell<Vec<CssBlock>>>,
    self_weak: RefCell<Weak<Mounter>>,
}

impl Mounter {
    pub fn new(
        doc: Rc<Document>,
        session: Rc<SessionContext>,
        scope: Scope,
        root: NodeId,
        spawner: LocalSpawner,
        css_blocks: Rc<RefCell<Vec<CssBlock>>>,
    ) -> Rc<Self> {
        let mounter = Rc::new(Self {
            doc,
            session,
            scope,
            root,
            spawner,
            css_blocks,
            self_weak: RefCell::new(Weak::new()),
        });
        *mounter.self_weak.borrow_mut() = Rc::downgrade(&mounter);
        mounter
    }

    fn rc(&self) -> Rc<Mounter> {
        self.self_weak
            .borrow()
            .upgrade()
            .expect("mounter alive while in use")
    }

    /// Mount one UI node into `parent`. The returned future completes when
    /// the subtree (minus still-pending descendants) is in the tree.
    pub fn mount(
        &self,
        node: UiNode,
        parent: NodeId,
        initial: bool,
    ) -> LocalBoxFuture<'static, ()> {
        let this = self.rc();
        async move {
            let UiNode {
                tag,
                attrs,
                mut children,
            } = node;

            // A pending child suspends this node only; siblings keep going.
            loop {
                match children {
                    Children::Pending(fut) => children = fut.await,
                    other => {
                        children = other;
                        break;
                    }
                }
            }

            if initial {
                this.doc.clear_children(this.root);
                this.install_styles();
            }

            let (children, parent) = match children {
                Children::Portal { target, child } => (*child, target),
                other => (other, parent),
            };

            let el = match &tag {
                Some(tag) => this.doc.create_element_in(tag, Some(parent)),
                None => parent,
            };

            for (name, value) in attrs {
                this.apply_attribute(el, &name, value);
            }

            match children {
                Children::RawHtml(html) => this.doc.append_html(el, &html),
                Children::Slot => {
                    let slot = this.doc.create_element("slot");
                    this.doc.append(el, slot);
                }
                Children::List(nodes) => {
                    let futures: Vec<_> = nodes
                        .into_iter()
                        .map(|child| this.mount(child, el, false))
                        .collect();
                    join_all(futures).await;
                }
                Children::Node(child) => this.mount(*child, el, false).await,
                Children::Dyn(f) => this.mount_dynamic(f, el),
                other => {
                    let text = this.doc.create_text(other.coerce_text().unwrap_or_default());
                    this.doc.append(el, text);
                }
            }

            if tag.is_some() {
                this.doc.append(parent, el);
            }
        }
        .boxed_local()
    }

    /// Scoped css: one `<style>` node whose text is rebuilt inside a single
    /// effect, so reactive css re-renders without touching other nodes.
    fn install_styles(&self) {
        let blocks = self.css_blocks.borrow().clone();
        if blocks.is_empty() {
            return;
        }

        let style = self.doc.create_element("style");
        let doc = self.doc.clone();
        self.scope.effect(move || {
            let mut css = String::new();
            for block in &blocks {
                css.push_str(&block());
            }
            doc.set_text_content(style, css);
        });
        self.doc.append(self.root, style);
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    fn apply_attribute(&self, el: NodeId, name: &str, value: AttrValue) {
        match value {
            AttrValue::Handler(handler) => {
                let event_name = name
                    .strip_prefix("on")
                    .unwrap_or(name)
                    .to_ascii_lowercase();
                self.doc.add_event_listener(
                    el,
                    &event_name,
                    Rc::new(move |event: &Event| match &event.detail {
                        Some(detail) => handler(EventArg::Detail(detail)),
                        None => handler(EventArg::Native(event)),
                    }),
                );
            }
            AttrValue::Ref(cell) => cell.set(Some(el)),
            AttrValue::Indicator(active) => {
                let doc = self.doc.clone();
                self.scope.effect(move || {
                    let class = doc.attribute(el, "class").unwrap_or_default();
                    let mut classes: Vec<&str> = class
                        .split_ascii_whitespace()
                        .filter(|c| *c != REQUEST_CLASS)
                        .collect();
                    if active.get() {
                        classes.push(REQUEST_CLASS);
                    }
                    if classes.is_empty() {
                        doc.remove_attribute(el, "class");
                    } else {
                        doc.set_attribute(el, "class", &classes.join(" "));
                    }
                });
            }
            AttrValue::Dyn(f) => {
                // The sole path by which attribute content is reactive.
                let this = self.rc();
                let name = name.to_string();
                self.scope.effect(move || {
                    let value = f();
                    this.set_attribute_value(el, &name, value);
                });
            }
            other => self.set_attribute_value(el, name, other),
        }
    }

    fn set_attribute_value(&self, el: NodeId, name: &str, value: AttrValue) {
        let namespaced = self.doc.is_svg(el) && (name.starts_with("xlink:") || name == "href");

        match value {
            AttrValue::On => {
                if namespaced {
                    self.doc.set_attribute_ns(el, name, "");
                } else {
                    self.doc.set_attribute(el, name, "");
                }
            }
            AttrValue::Off => {
                if namespaced {
                    self.doc.remove_attribute_ns(el, name);
                } else {
                    self.doc.remove_attribute(el, name);
                }
            }
            AttrValue::Static(raw) => {
                let value = self.session.paths.rewrite(name, &raw);
                if namespaced {
                    self.doc.set_attribute_ns(el, name, &value);
                } else {
                    self.doc.set_attribute(el, name, &value);
                }
            }
            // A reactive thunk may itself yield a sentinel or string.
            AttrValue::Dyn(f) => self.set_attribute_value(el, name, f()),
            // Handlers, refs and indicators have no serialized form.
            _ => {}
        }
    }

    // =========================================================================
    // Reactive children
    // =========================================================================

    fn mount_dynamic(&self, f: DynChildren, el: NodeId) {
        let this = self.rc();
        let inserted: Rc<RefCell<Option<Vec<NodeId>>>> = Rc::new(RefCell::new(None));

        self.scope.effect(move || {
            let child = f();
            match child {
                Children::Pending(fut) => {
                    // Defer the anchor swap until resolution; the effect
                    // itself never blocks.
                    this.defer_dynamic(fut, el, &inserted)
                }
                resolved => this.apply_dynamic(resolved, el, &inserted),
            }
        });
    }

    fn defer_dynamic(
        &self,
        fut: ChildFuture,
        el: NodeId,
        inserted: &Rc<RefCell<Option<Vec<NodeId>>>>,
    ) {
        let this = self.rc();
        let inserted = inserted.clone();
        let task = async move {
            let resolved = fut.await;
            this.apply_dynamic(resolved, el, &inserted);
        };
        let _ = self.spawner.spawn_local(task.boxed_local());
    }

    fn apply_dynamic(
        &self,
        child: Children,
        el: NodeId,
        inserted: &Rc<RefCell<Option<Vec<NodeId>>>>,
    ) {
        let (child, mut el) = match child {
            Children::Portal { target, child } => (*child, target),
            other => (other, el),
        };

        // The anchor's container may have been replaced by a sibling effect
        // since the last run; fall back to the component root.
        if inserted.borrow().is_some() && el != self.root && self.doc.parent(el).is_none() {
            el = self.root;
        }

        match child {
            Children::RawHtml(html) => {
                let temp = self.doc.create_element(CONTEXT_TAG);
                self.doc.append_html(temp, &html);
                let nodes = self.doc.children(temp);
                self.insert_or_update(el, nodes, inserted);
            }
            list @ (Children::List(_) | Children::Node(_)) => {
                let temp = self.doc.create_element(CONTEXT_TAG);
                let fut = match list {
                    Children::List(nodes) => {
                        let futures: Vec<_> = nodes
                            .into_iter()
                            .map(|node| self.mount(node, temp, false))
                            .collect();
                        async move {
                            join_all(futures).await;
                        }
                        .boxed_local()
                    }
                    Children::Node(node) => self.mount(*node, temp, false),
                    _ => unreachable!(),
                };
                // Static content lands synchronously; a suspended subtree
                // finishes on the executor while the swap proceeds.
                self.drive(fut);
                let nodes = self.doc.children(temp);
                self.insert_or_update(el, nodes, inserted);
            }
            Children::Dyn(inner) => {
                // Nested thunks collapse within the same effect run.
                let resolved = inner();
                self.apply_dynamic(resolved, el, inserted);
            }
            Children::Pending(fut) => self.defer_dynamic(fut, el, inserted),
            Children::Slot => {
                let slot = self.doc.create_element("slot");
                self.insert_or_update(el, vec![slot], inserted);
            }
            other => {
                let text = self.doc.create_text(other.coerce_text().unwrap_or_default());
                self.insert_or_update(el, vec![text], inserted);
            }
        }
    }

    /// Anchored replacement. Insert the new range before the old one, then
    /// remove the old range in two phases (everything up to the last node,
    /// then the last node) so no intermediate state shows a gap.
    fn insert_or_update(
        &self,
        el: NodeId,
        nodes: Vec<NodeId>,
        inserted: &Rc<RefCell<Option<Vec<NodeId>>>>,
    ) {
        let doc = &self.doc;
        let prev = inserted.borrow().clone();

        let anchor = prev.as_ref().and_then(|prev| {
            prev.iter()
                .enumerate()
                .find(|(_, &n)| doc.contains(el, n))
                .map(|(i, &n)| (i, n, *prev.last().expect("non-empty range")))
        });

        match anchor {
            Some((anchor_index, anchor_node, last)) => {
                // The anchor lost leading siblings to another effect that
                // briefly shared this container; clear the stale ones.
                if anchor_index > 0 {
                    while let Some(stale) = doc.previous_sibling(anchor_node) {
                        doc.detach(stale);
                    }
                }

                let range_parent = doc.parent(anchor_node).unwrap_or(el);
                for &node in &nodes {
                    doc.insert_before(range_parent, node, Some(anchor_node));
                }

                // Old range out: everything before the last node first.
                let mut old = Some(anchor_node);
                while let Some(current) = old {
                    if current == last {
                        break;
                    }
                    let next = doc.next_sibling(current);
                    doc.detach(current);
                    old = next;
                }
                doc.detach(last);
            }
            None => {
                for &node in &nodes {
                    doc.append(el, node);
                }
            }
        }

        *inserted.borrow_mut() = Some(nodes);
    }

    /// Poll a mount future once; anything still pending continues on the
    /// executor.
    fn drive(&self, fut: LocalBoxFuture<'static, ()>) {
        let mut fut = fut;
        let mut cx = Context::from_waker(futures::task::noop_waker_ref());
        if let Poll::Pending = fut.poll_unpin(&mut cx) {
            let _ = self.spawner.spawn_local(fut);
        }
    }
}
