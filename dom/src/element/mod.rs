//! Component instance lifecycle.
//!
//! One custom element = one [`ElementInstance`] built from an
//! [`ElementDefinition`] (render function, observed attributes, optional
//! suspense and error renders). The instance implements the platform's
//! custom-element callback interface as a plain struct: connect mounts,
//! disconnect resets the reactive scope, and attribute changes write the
//! existing prop cells in place so mounted subscriptions keep their cell
//! objects.

pub mod attributes;

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use cinder_signals::{derived, state, Derived, Scope, State, Store};
use futures::executor::LocalSpawner;
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::dom::{Document, Event, NodeId, StyleSheet};
use crate::error::MountError;
use crate::render::{Children, CssBlock, Mounter, UiNode};
use crate::session::SessionContext;

use attributes::deserialize;

/// The identity attribute; a value change forces a full remount.
const KEY_ATTRIBUTE: &str = "key";

/// Dispatches a component event out through the host element.
pub type EventEmitter = Rc<dyn Fn(Option<Value>)>;

/// Render function: props + context in, UI description out.
pub type RenderFn = Rc<dyn Fn(&Props, &WebContext) -> Result<Children, MountError>>;

/// The platform's custom-element callback interface, implemented by
/// [`ElementInstance`] instead of inherited from a base class.
pub trait CustomElementCallbacks {
    fn connected(&self) -> LocalBoxFuture<'_, Result<(), MountError>>;
    fn disconnected(&self);
    fn attribute_changed(
        &self,
        name: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) -> LocalBoxFuture<'_, Result<(), MountError>>;
}

// =============================================================================
// Props
// =============================================================================

/// Resolved prop values for one render path.
///
/// Built once per mount; attribute changes write the existing cells.
#[derive(Default)]
pub struct Props {
    cells: IndexMap<String, State<Value>>,
    events: IndexMap<String, EventEmitter>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell(&self, name: &str) -> Option<State<Value>> {
        self.cells.get(name).cloned()
    }

    /// Current value of a prop cell (tracked when read in an effect).
    pub fn value(&self, name: &str) -> Value {
        self.cells
            .get(name)
            .map(|cell| cell.get())
            .unwrap_or(Value::Null)
    }

    pub fn emitter(&self, name: &str) -> Option<EventEmitter> {
        self.events.get(name).cloned()
    }

    /// The projected content: a slot element.
    pub fn children(&self) -> Children {
        Children::node(UiNode::element("slot", Vec::new(), Children::Empty))
    }

    pub fn insert_cell(&mut self, name: impl Into<String>, cell: State<Value>) {
        self.cells.insert(name.into(), cell);
    }
}

// =============================================================================
// Web context
// =============================================================================

/// Per-render capabilities handed to the render function.
pub struct WebContext {
    doc: Rc<Document>,
    session: Rc<SessionContext>,
    scope: Scope,
    host: NodeId,
    store: Rc<Store<String, Value>>,
    css_blocks: Rc<RefCell<Vec<CssBlock>>>,
    after_mount: Rc<RefCell<Vec<Box<dyn FnOnce()>>>>,
    id_counter: Rc<Cell<usize>>,
}

impl WebContext {
    pub fn state<T: 'static>(&self, value: T) -> State<T> {
        state(value)
    }

    pub fn derived<T, F>(&self, f: F) -> Derived<T>
    where
        T: Clone + 'static,
        F: FnMut() -> T + 'static,
    {
        derived(f)
    }

    /// Effect owned by this render's scope.
    pub fn effect<F>(&self, f: F)
    where
        F: FnMut() + 'static,
    {
        self.scope.effect(f);
    }

    /// The shared session store.
    pub fn store(&self) -> Rc<Store<String, Value>> {
        self.store.clone()
    }

    /// Collect a scoped-css block; blocks concatenate into one style node
    /// re-rendered reactively.
    pub fn css(&self, block: impl Fn() -> String + 'static) {
        self.css_blocks.borrow_mut().push(Rc::new(block));
    }

    /// Run a callback once the whole mount has completed.
    pub fn on_mount(&self, f: impl FnOnce() + 'static) {
        self.after_mount.borrow_mut().push(Box::new(f));
    }

    /// Stable id: server-assigned `data-id-N` when present, generated
    /// otherwise.
    pub fn use_id(&self) -> String {
        let n = self.id_counter.get() + 1;
        self.id_counter.set(n);
        self.doc
            .attribute(self.host, &format!("data-id-{n}"))
            .unwrap_or_else(|| format!("uid-{}-{}", self.host.index(), n))
    }

    /// The host element.
    pub fn self_node(&self) -> NodeId {
        self.host
    }

    pub fn document(&self) -> Rc<Document> {
        self.doc.clone()
    }

    pub fn session(&self) -> Rc<SessionContext> {
        self.session.clone()
    }
}

// =============================================================================
// Definition
// =============================================================================

/// Factory for element instances: render functions plus the observed
/// attribute list, assembled builder-style.
pub struct ElementDefinition {
    render: RenderFn,
    suspense: Option<RenderFn>,
    error: Option<RenderFn>,
    observed: Vec<String>,
}

impl ElementDefinition {
    pub fn new(
        render: impl Fn(&Props, &WebContext) -> Result<Children, MountError> + 'static,
    ) -> Self {
        Self {
            render: Rc::new(render),
            suspense: None,
            error: None,
            observed: Vec::new(),
        }
    }

    pub fn observed_attributes(mut self, attrs: &[&str]) -> Self {
        self.observed = attrs.iter().map(|a| a.to_string()).collect();
        self
    }

    /// Render shown while the primary render is pending.
    pub fn suspense(
        mut self,
        render: impl Fn(&Props, &WebContext) -> Result<Children, MountError> + 'static,
    ) -> Self {
        self.suspense = Some(Rc::new(render));
        self
    }

    /// Render mounted when the primary render fails, with the error bound
    /// as the `error` prop.
    pub fn error(
        mut self,
        render: impl Fn(&Props, &WebContext) -> Result<Children, MountError> + 'static,
    ) -> Self {
        self.error = Some(Rc::new(render));
        self
    }

    /// Observed attributes including the implicit identity attribute.
    fn observed_with_key(&self) -> Vec<String> {
        let mut observed = self.observed.clone();
        if !observed.iter().any(|a| a == KEY_ATTRIBUTE) {
            observed.push(KEY_ATTRIBUTE.to_string());
        }
        observed
    }

    /// Build an instance bound to a host element.
    pub fn instantiate(
        self,
        doc: Rc<Document>,
        session: Rc<SessionContext>,
        host: NodeId,
        spawner: LocalSpawner,
    ) -> Rc<ElementInstance> {
        ElementInstance::new(Rc::new(self), doc, session, host, spawner)
    }
}

// =============================================================================
// Instance
// =============================================================================

enum PropSlot {
    Primary,
    Suspense,
}

pub struct ElementInstance {
    definition: Rc<ElementDefinition>,
    doc: Rc<Document>,
    session: Rc<SessionContext>,
    host: NodeId,
    spawner: LocalSpawner,

    /// Active reactive scope (suspense, primary, or error render).
    scope: RefCell<Option<Scope>>,

    /// Prop slots for the primary and fallback render paths.
    props: RefCell<Option<Rc<Props>>>,
    suspense_props: RefCell<Option<Rc<Props>>>,

    css_blocks: Rc<RefCell<Vec<CssBlock>>>,
    after_mount: Rc<RefCell<Vec<Box<dyn FnOnce()>>>>,
    id_counter: Rc<Cell<usize>>,

    self_weak: RefCell<Weak<ElementInstance>>,
}

impl ElementInstance {
    fn new(
        definition: Rc<ElementDefinition>,
        doc: Rc<Document>,
        session: Rc<SessionContext>,
        host: NodeId,
        spawner: LocalSpawner,
    ) -> Rc<Self> {
        let instance = Rc::new(Self {
            definition,
            doc,
            session,
            host,
            spawner,
            scope: RefCell::new(None),
            props: RefCell::new(None),
            suspense_props: RefCell::new(None),
            css_blocks: Rc::new(RefCell::new(Vec::new())),
            after_mount: Rc::new(RefCell::new(Vec::new())),
            id_counter: Rc::new(Cell::new(0)),
            self_weak: RefCell::new(Weak::new()),
        });
        *instance.self_weak.borrow_mut() = Rc::downgrade(&instance);
        instance
    }

    fn rc(&self) -> Rc<ElementInstance> {
        self.self_weak
            .borrow()
            .upgrade()
            .expect("instance alive while in use")
    }

    pub fn host(&self) -> NodeId {
        self.host
    }

    pub fn props(&self) -> Option<Rc<Props>> {
        self.props.borrow().clone()
    }

    /// Collect ambient document stylesheets into one private sheet adopted
    /// by the shadow root. Inaccessible rules degrade to an import
    /// reference.
    fn adopt_ambient_styles(&self, shadow: NodeId) {
        let mut rules = Vec::new();
        for sheet in self.doc.style_sheets() {
            if sheet.accessible {
                rules.extend(sheet.rules.clone());
            } else if let Some(href) = &sheet.href {
                rules.push(format!("@import url('{href}');"));
            }
        }
        self.doc.adopt_sheet(shadow, StyleSheet::inline(rules));
    }

    /// Build the prop bag for one render path from the observed attribute
    /// list: `on*` names become event dispatchers, everything else a state
    /// cell holding the deserialized attribute value.
    fn build_props(&self, extra: Option<(String, State<Value>)>) -> Props {
        let mut props = Props::new();

        for attr in self.definition.observed_with_key() {
            if attr.starts_with("on") {
                let doc = self.doc.clone();
                let host = self.host;
                let event_name = attr[2..].to_ascii_lowercase();
                props.events.insert(
                    attr.clone(),
                    Rc::new(move |detail: Option<Value>| {
                        let event = match detail {
                            Some(detail) => Event::custom(event_name.clone(), detail),
                            None => Event::native(event_name.clone()),
                        };
                        doc.dispatch(host, &event);
                    }),
                );
            } else {
                let value = deserialize(self.doc.attribute(self.host, &attr).as_deref());
                props.cells.insert(attr, state(value));
            }
        }

        if let Some((name, cell)) = extra {
            props.cells.insert(name, cell);
        }
        props
    }

    async fn start_render(
        &self,
        render: RenderFn,
        extra: Option<(String, State<Value>)>,
        scope: Scope,
        slot: PropSlot,
        shadow: NodeId,
    ) -> Result<(), MountError> {
        *self.scope.borrow_mut() = Some(scope.clone());

        let props = Rc::new(self.build_props(extra));
        match slot {
            PropSlot::Primary => *self.props.borrow_mut() = Some(props.clone()),
            PropSlot::Suspense => *self.suspense_props.borrow_mut() = Some(props.clone()),
        }

        let ctx = WebContext {
            doc: self.doc.clone(),
            session: self.session.clone(),
            scope: scope.clone(),
            host: self.host,
            store: self.session.ensure_store(),
            css_blocks: self.css_blocks.clone(),
            after_mount: self.after_mount.clone(),
            id_counter: self.id_counter.clone(),
        };

        self.css_blocks.borrow_mut().clear();
        let children = render(&props, &ctx)?;

        let mounter = Mounter::new(
            self.doc.clone(),
            self.session.clone(),
            scope,
            shadow,
            self.spawner.clone(),
            self.css_blocks.clone(),
        );
        mounter
            .mount(UiNode::fragment(children), shadow, true)
            .await;
        Ok(())
    }

    async fn run_connect(self: Rc<Self>) -> Result<(), MountError> {
        debug!(host = self.host.index(), "element connect");

        let shadow = self.doc.attach_shadow(self.host);
        self.adopt_ambient_styles(shadow);
        self.after_mount.borrow_mut().clear();

        let suspense_scope = Scope::new();
        let primary_scope = Scope::new();

        let definition = self.definition.clone();
        let result: Result<(), MountError> = async {
            if let Some(suspense) = definition.suspense.clone() {
                self.start_render(
                    suspense,
                    None,
                    suspense_scope.clone(),
                    PropSlot::Suspense,
                    shadow,
                )
                .await?;
            }
            self.start_render(
                definition.render.clone(),
                None,
                primary_scope.clone(),
                PropSlot::Primary,
                shadow,
            )
            .await
        }
        .await;

        match result {
            Ok(()) => {
                suspense_scope.reset();
                *self.suspense_props.borrow_mut() = None;
            }
            Err(err) => {
                suspense_scope.reset();
                primary_scope.reset();
                *self.suspense_props.borrow_mut() = None;

                match self.definition.error.clone() {
                    Some(error_render) => {
                        debug!(error = %err, "primary render failed, mounting error render");
                        let error_scope = Scope::new();
                        let error_cell = state(Value::String(err.message().to_string()));
                        self.start_render(
                            error_render,
                            Some(("error".to_string(), error_cell)),
                            error_scope,
                            PropSlot::Primary,
                            shadow,
                        )
                        .await?;
                    }
                    None => return Err(err),
                }
            }
        }

        let callbacks: Vec<_> = self.after_mount.borrow_mut().drain(..).collect();
        for callback in callbacks {
            callback();
        }
        Ok(())
    }

    async fn run_attribute_changed(
        self: Rc<Self>,
        name: String,
        old: Option<String>,
        new: Option<String>,
    ) -> Result<(), MountError> {
        // Identity change: full teardown and remount.
        if name == KEY_ATTRIBUTE && old.is_some() && old != new {
            self.disconnected();
            return self.run_connect().await;
        }

        if name.starts_with("on") || old == new {
            return Ok(());
        }

        // Update the existing cell in place; the fallback slot wins while a
        // suspense render is showing.
        let props = self
            .suspense_props
            .borrow()
            .clone()
            .or_else(|| self.props.borrow().clone());
        if let Some(props) = props {
            if let Some(cell) = props.cell(&name) {
                cell.set(deserialize(new.as_deref()));
            }
        }
        Ok(())
    }
}

impl CustomElementCallbacks for ElementInstance {
    fn connected(&self) -> LocalBoxFuture<'_, Result<(), MountError>> {
        let this = self.rc();
        async move { this.run_connect().await }.boxed_local()
    }

    /// Dispose the active scope; the host owns DOM removal.
    fn disconnected(&self) {
        debug!(host = self.host.index(), "element disconnect");
        if let Some(scope) = self.scope.borrow_mut().take() {
            scope.reset();
        }
    }

    fn attribute_changed(
        &self,
        name: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) -> LocalBoxFuture<'_, Result<(), MountError>> {
        let this = self.rc();
        let name = name.to_string();
        let old = old.map(str::to_string);
        let new = new.map(str::to_string);
        async move { this.run_attribute_changed(name, old, new).await }.boxed_local()
    }
}
