// ============================================================================
// cinder-signals - State Cells
// The writable reactive cell
// ============================================================================

use std::rc::Rc;

use crate::core::context::with_context;
use crate::core::types::{AnySource, SourceInner};
use crate::reactivity::tracking::{notify_write, track_read};

/// A writable reactive cell.
///
/// Writes are equality-free: every `set` notifies dependents, identical
/// value or not. The runtime depends on this for values mutated in place.
///
/// # Example
///
/// ```
/// use cinder_signals::state;
///
/// let count = state(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct State<T> {
    inner: Rc<SourceInner<T>>,
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: 'static> State<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(SourceInner::new(value)),
        }
    }

    /// Get the current value (cloning). Registers a dependency when read
    /// inside an effect or derived.
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        track_read(self.inner.clone() as Rc<dyn AnySource>);
        self.inner.get()
    }

    /// Access the current value with a closure (avoids cloning).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        track_read(self.inner.clone() as Rc<dyn AnySource>);
        self.inner.with(f)
    }

    /// Set the value. Always marks dependents dirty and re-runs affected
    /// effects before returning.
    pub fn set(&self, value: T) {
        self.inner.set(value);
        with_context(|ctx| {
            let wv = ctx.increment_write_version();
            self.inner.set_write_version(wv);
        });
        notify_write(self.inner.clone() as Rc<dyn AnySource>);
    }

    /// Mutate the value in place, then notify.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.inner.update(f);
        with_context(|ctx| {
            let wv = ctx.increment_write_version();
            self.inner.set_write_version(wv);
        });
        notify_write(self.inner.clone() as Rc<dyn AnySource>);
    }

    /// Write without notifying. Used for wiring that must not re-enter the
    /// graph, e.g. `ref` bindings during mount.
    pub fn set_silent(&self, value: T) {
        self.inner.set(value);
    }

    pub fn inner(&self) -> &Rc<SourceInner<T>> {
        &self.inner
    }

    pub fn as_any_source(&self) -> Rc<dyn AnySource> {
        self.inner.clone()
    }
}

impl<T: std::fmt::Debug + Clone + 'static> std::fmt::Debug for State<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State").field("value", &self.inner.get()).finish()
    }
}

/// Create a new writable state cell.
pub fn state<T: 'static>(value: T) -> State<T> {
    State::new(value)
}

// =============================================================================
// TESTS
// =============================================================================
