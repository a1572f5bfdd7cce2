//! Session-scoped runtime context.
//!
//! The original runtime hung its shared state off the window object: the
//! live store, the stash of store pairs arriving before any component
//! mounted, the pending navigation, and the last page-transition handle.
//! Here all of it lives in one explicit context passed to the mount engine
//! and the protocol client. The store must exist before the first patch is
//! applied; `ensure_store` is the single initialization point and drains
//! the deferred stash when it runs.

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use cinder_signals::Store;
use futures::channel::oneshot;
use serde_json::Value;

use crate::render::paths::PathConfig;

/// Render/navigation mode label carried by `X-Mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Native,
    Transition,
    Reactivity,
}

impl FromStr for RenderMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(Self::Native),
            "transition" => Ok(Self::Transition),
            "reactivity" => Ok(Self::Reactivity),
            _ => Err(()),
        }
    }
}

impl RenderMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::Transition => "transition",
            Self::Reactivity => "reactivity",
        }
    }
}

/// Signals completion of a page-level visual transition.
///
/// Whoever starts a transition keeps the [`TransitionGuard`] and drops it
/// (or calls `finish`) when the visuals settle; the protocol client awaits
/// the recorded handle before returning.
pub struct TransitionGuard {
    sender: Option<oneshot::Sender<()>>,
}

impl TransitionGuard {
    pub fn finish(mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(());
        }
    }
}

impl Drop for TransitionGuard {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(());
        }
    }
}

pub struct SessionContext {
    /// Live reactive store, present once a component scope exists.
    store: RefCell<Option<Rc<Store<String, Value>>>>,

    /// Store pairs that arrived with no signal graph to notify.
    deferred_store: RefCell<Option<Vec<(String, Value)>>>,

    /// Requested browser location, set by a navigate disposition.
    location: RefCell<Option<String>>,

    /// Mode label recorded alongside a navigation.
    navigation_mode: RefCell<Option<RenderMode>>,

    /// Completion signal of the page transition currently in flight.
    transition: RefCell<Option<oneshot::Receiver<()>>>,

    /// Inline scripts executed by the patch load hook.
    executed_scripts: RefCell<Vec<String>>,

    pub paths: PathConfig,
}

impl SessionContext {
    pub fn new() -> Rc<Self> {
        Self::with_paths(PathConfig::default())
    }

    pub fn with_paths(paths: PathConfig) -> Rc<Self> {
        Rc::new(Self {
            store: RefCell::new(None),
            deferred_store: RefCell::new(None),
            location: RefCell::new(None),
            navigation_mode: RefCell::new(None),
            transition: RefCell::new(None),
            executed_scripts: RefCell::new(Vec::new()),
            paths,
        })
    }

    // =========================================================================
    // Store
    // =========================================================================

    /// The live store, creating it on first use and draining any deferred
    /// pairs into it.
    pub fn ensure_store(&self) -> Rc<Store<String, Value>> {
        if let Some(store) = self.store.borrow().as_ref() {
            return store.clone();
        }

        let store: Rc<Store<String, Value>> = Rc::new(Store::new());
        if let Some(pairs) = self.deferred_store.borrow_mut().take() {
            for (key, value) in pairs {
                store.set(key, value);
            }
        }
        *self.store.borrow_mut() = Some(store.clone());
        store
    }

    pub fn live_store(&self) -> Option<Rc<Store<String, Value>>> {
        self.store.borrow().clone()
    }

    /// Merge server-computed pairs: through the live store when present
    /// (notifying per-key dependents), otherwise stashed for lazy pickup.
    pub fn update_store(&self, pairs: Vec<(String, Value)>) {
        match self.live_store() {
            Some(store) => {
                for (key, value) in pairs {
                    store.set(key, value);
                }
            }
            None => *self.deferred_store.borrow_mut() = Some(pairs),
        }
    }

    /// Deferred pairs currently stashed (none once a store exists).
    pub fn deferred_pairs(&self) -> Option<Vec<(String, Value)>> {
        self.deferred_store.borrow().clone()
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Record a navigation: the mode label, then the location assignment.
    pub fn navigate(&self, url: &str, mode: Option<RenderMode>) {
        *self.navigation_mode.borrow_mut() = mode;
        *self.location.borrow_mut() = Some(url.to_string());
        // Navigation tears down any pending transition.
        *self.transition.borrow_mut() = None;
    }

    pub fn location(&self) -> Option<String> {
        self.location.borrow().clone()
    }

    pub fn navigation_mode(&self) -> Option<RenderMode> {
        *self.navigation_mode.borrow()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Record a pending page transition; returns the guard whose completion
    /// resolves the handle.
    pub fn begin_transition(&self) -> TransitionGuard {
        let (sender, receiver) = oneshot::channel();
        *self.transition.borrow_mut() = Some(receiver);
        TransitionGuard {
            sender: Some(sender),
        }
    }

    /// Take the pending transition handle, if one was recorded.
    pub fn take_transition(&self) -> Option<oneshot::Receiver<()>> {
        self.transition.borrow_mut().take()
    }

    // =========================================================================
    // Scripts
    // =========================================================================

    /// Record an inline script executed by the patch load hook.
    pub fn record_script(&self, source: impl Into<String>) {
        self.executed_scripts.borrow_mut().push(source.into());
    }

    pub fn executed_scripts(&self) -> Vec<String> {
        self.executed_scripts.borrow().clone()
    }
}

// =============================================================================
// Tests
// =============================================================================
