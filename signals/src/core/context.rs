// ============================================================================
// cinder-signals - Reactive Context
// Thread-local state for tracking the current reaction
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::types::{AnyReaction, AnySource};

/// Thread-local reactive context holding the global tracking state.
///
/// The runtime is single-threaded and cooperative; a thread-local struct is
/// the whole of the "global" machinery.
pub struct ReactiveContext {
    /// Currently executing reaction (effect or derived).
    pub active_reaction: RefCell<Option<Weak<dyn AnyReaction>>>,

    /// Currently executing effect (for effect tree parenting).
    pub active_effect: RefCell<Option<Weak<dyn AnyReaction>>>,

    /// Global write version - incremented on every state write.
    pub write_version: Cell<u32>,

    /// Global read version - incremented on every reaction run.
    pub read_version: Cell<u32>,

    /// Dependencies collected during the current reaction run.
    pub new_deps: RefCell<Vec<Rc<dyn AnySource>>>,

    /// Monotonic effect creation counter; flushes run effects in this
    /// (registration) order.
    pub effect_sequence: Cell<u64>,
}

impl ReactiveContext {
    pub fn new() -> Self {
        Self {
            active_reaction: RefCell::new(None),
            active_effect: RefCell::new(None),
            write_version: Cell::new(1),
            read_version: Cell::new(0),
            new_deps: RefCell::new(Vec::new()),
            effect_sequence: Cell::new(0),
        }
    }

    /// Next effect creation sequence number.
    pub fn next_effect_sequence(&self) -> u64 {
        let v = self.effect_sequence.get() + 1;
        self.effect_sequence.set(v);
        v
    }

    /// Set the active reaction, returning the previous one.
    pub fn set_active_reaction(
        &self,
        reaction: Option<Weak<dyn AnyReaction>>,
    ) -> Option<Weak<dyn AnyReaction>> {
        self.active_reaction.replace(reaction)
    }

    pub fn get_active_reaction(&self) -> Option<Weak<dyn AnyReaction>> {
        self.active_reaction.borrow().clone()
    }

    pub fn has_active_reaction(&self) -> bool {
        self.active_reaction.borrow().is_some()
    }

    /// Set the active effect, returning the previous one.
    pub fn set_active_effect(
        &self,
        effect: Option<Weak<dyn AnyReaction>>,
    ) -> Option<Weak<dyn AnyReaction>> {
        self.active_effect.replace(effect)
    }

    pub fn get_active_effect(&self) -> Option<Weak<dyn AnyReaction>> {
        self.active_effect.borrow().clone()
    }

    pub fn increment_write_version(&self) -> u32 {
        let v = self.write_version.get() + 1;
        self.write_version.set(v);
        v
    }

    pub fn get_write_version(&self) -> u32 {
        self.write_version.get()
    }

    pub fn increment_read_version(&self) -> u32 {
        let v = self.read_version.get() + 1;
        self.read_version.set(v);
        v
    }

    pub fn get_read_version(&self) -> u32 {
        self.read_version.get()
    }

    /// Swap out the new_deps list, returning the old one.
    pub fn swap_new_deps(&self, deps: Vec<Rc<dyn AnySource>>) -> Vec<Rc<dyn AnySource>> {
        self.new_deps.replace(deps)
    }

    pub fn add_new_dep(&self, source: Rc<dyn AnySource>) {
        self.new_deps.borrow_mut().push(source);
    }
}

impl Default for ReactiveContext {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static CONTEXT: ReactiveContext = ReactiveContext::new();
}

/// Access the thread-local reactive context.
pub fn with_context<R>(f: impl FnOnce(&ReactiveContext) -> R) -> R {
    CONTEXT.with(f)
}

/// Check whether reads are currently being tracked.
pub fn is_tracking() -> bool {
    with_context(|ctx| ctx.has_active_reaction())
}

/// Get the current global write version.
pub fn write_version() -> u32 {
    with_context(|ctx| ctx.get_write_version())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_creation() {
        with_context(|ctx| {
            assert!(!ctx.has_active_reaction());
            assert_eq!(ctx.get_read_version(), 0);
        });
    }

    #[test]
    fn version_counters() {
        with_context(|ctx| {
            let start = ctx.get_write_version();
            assert_eq!(ctx.increment_write_version(), start + 1);
            assert_eq!(ctx.increment_write_version(), start + 2);

            let start = ctx.get_read_version();
            assert_eq!(ctx.increment_read_version(), start + 1);
        });
    }

    #[test]
    fn not_tracking_outside_reaction() {
        assert!(!is_tracking());
        assert!(write_version() >= 1);
    }
}
