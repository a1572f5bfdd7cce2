// ============================================================================
// cinder-signals - Component Scope
// Groups the effects of one component instance for batch disposal
// ============================================================================
//
// A component instance creates one scope per mount. Root effects created
// while the scope is active are collected; `reset()` disposes them all
// (child effects fall with their parents), runs registered cleanups, and
// leaves the scope inert. Reset is idempotent and terminal: a re-mount
// builds a fresh scope.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::primitives::effect::{destroy_effect, EffectInner};

thread_local! {
    /// Currently active scope, if any.
    static ACTIVE_SCOPE: RefCell<Option<Rc<ScopeInner>>> = const { RefCell::new(None) };
}

fn get_active_scope() -> Option<Rc<ScopeInner>> {
    ACTIVE_SCOPE.with(|s| s.borrow().clone())
}

fn set_active_scope(scope: Option<Rc<ScopeInner>>) -> Option<Rc<ScopeInner>> {
    ACTIVE_SCOPE.with(|s| s.replace(scope))
}

/// Cleanup function run when the owning scope resets.
pub type ScopeCleanupFn = Box<dyn FnOnce()>;

struct ScopeInner {
    active: Cell<bool>,
    effects: RefCell<Vec<Rc<EffectInner>>>,
    cleanups: RefCell<Vec<ScopeCleanupFn>>,
}

/// Handle to a component's reactive scope.
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl Clone for Scope {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl Scope {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ScopeInner {
                active: Cell::new(true),
                effects: RefCell::new(Vec::new()),
                cleanups: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Run a function with this scope active; root effects created inside
    /// are owned by the scope.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let prev = set_active_scope(Some(self.inner.clone()));
        let result = f();
        set_active_scope(prev);
        result
    }

    /// Create an effect owned by this scope.
    pub fn effect<F>(&self, f: F)
    where
        F: FnMut() + 'static,
    {
        self.run(|| {
            // The scope owns the effect; the standalone disposer is dropped
            // but the record stays alive through the scope's list.
            let _ = crate::primitives::effect::effect(f);
        });
    }

    /// Register a cleanup run on reset.
    pub fn on_cleanup(&self, f: impl FnOnce() + 'static) {
        if self.inner.active.get() {
            self.inner.cleanups.borrow_mut().push(Box::new(f));
        }
    }

    /// Dispose every effect created within the scope. Idempotent.
    pub fn reset(&self) {
        if !self.inner.active.replace(false) {
            return;
        }

        let effects: Vec<_> = self.inner.effects.borrow_mut().drain(..).collect();
        for effect in effects {
            destroy_effect(effect, true);
        }

        let cleanups: Vec<_> = self.inner.cleanups.borrow_mut().drain(..).collect();
        for cleanup in cleanups {
            cleanup();
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

/// Register a root effect with the active scope. Called by effect creation;
/// child effects are owned by their parents instead.
pub(crate) fn register_effect_with_scope(effect: &Rc<EffectInner>) {
    if let Some(scope) = get_active_scope() {
        if scope.active.get() {
            scope.effects.borrow_mut().push(effect.clone());
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
