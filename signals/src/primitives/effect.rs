// ============================================================================
// cinder-signals - Effect System
// Side effects that re-run when dependencies change
// ============================================================================
//
// Effects are eager reactions: they run once on creation, record every cell
// read during the run, and re-run synchronously whenever any of those cells
// is written.
//
// Effects form a tree. An effect created while another effect is running
// becomes its child ("sub-effect"); a re-run or disposal of the parent
// destroys the children first. Conditional and list regions in the mount
// engine rely on this to tear down without leaking subscriptions.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::{AnyReaction, AnySource};
use crate::primitives::scope::register_effect_with_scope;
use crate::reactivity::tracking::remove_reactions;

// =============================================================================
// TYPE ALIASES
// =============================================================================

/// Cleanup function returned by an effect, run before its next execution
/// and on disposal.
pub type CleanupFn = Box<dyn FnOnce()>;

/// Effect function signature - returns an optional cleanup.
pub type EffectFn = Box<dyn FnMut() -> Option<CleanupFn>>;

/// Dispose function returned when creating an effect.
pub type DisposeFn = Box<dyn FnOnce()>;

// =============================================================================
// EFFECT INNER
// =============================================================================

/// The inner effect record.
///
/// Implements `AnyReaction` (but not `AnySource`; effects have no
/// dependents). Holds the function, its dependencies, the teardown from the
/// last run, and the tree links.
pub struct EffectInner {
    flags: Cell<u32>,

    /// Creation sequence; flush order follows it.
    sequence: u64,

    /// The effect function.
    func: RefCell<Option<EffectFn>>,

    /// Sources this effect read during its last run.
    deps: RefCell<Vec<Rc<dyn AnySource>>>,

    /// Teardown from the last run.
    teardown: RefCell<Option<CleanupFn>>,

    // Effect tree: strong child/next links, weak parent/prev/last links.
    parent: RefCell<Option<Weak<EffectInner>>>,
    first_child: RefCell<Option<Rc<EffectInner>>>,
    last_child: RefCell<Option<Weak<EffectInner>>>,
    prev_sibling: RefCell<Option<Weak<EffectInner>>>,
    next_sibling: RefCell<Option<Rc<EffectInner>>>,

    /// Weak self-reference for trait-object conversion.
    self_weak: RefCell<Weak<EffectInner>>,
}

impl EffectInner {
    pub fn new(effect_type: u32, func: Option<EffectFn>) -> Rc<Self> {
        let effect = Rc::new(Self {
            flags: Cell::new(effect_type | DIRTY),
            sequence: with_context(|ctx| ctx.next_effect_sequence()),
            func: RefCell::new(func),
            deps: RefCell::new(Vec::new()),
            teardown: RefCell::new(None),
            parent: RefCell::new(None),
            first_child: RefCell::new(None),
            last_child: RefCell::new(None),
            prev_sibling: RefCell::new(None),
            next_sibling: RefCell::new(None),
            self_weak: RefCell::new(Weak::new()),
        });

        *effect.self_weak.borrow_mut() = Rc::downgrade(&effect);
        effect
    }

    /// This effect as a weak `AnyReaction`.
    pub fn as_weak_reaction(&self) -> Weak<dyn AnyReaction> {
        if let Some(rc) = self.self_weak.borrow().upgrade() {
            Rc::downgrade(&(rc as Rc<dyn AnyReaction>))
        } else {
            Weak::<EffectInner>::new() as Weak<dyn AnyReaction>
        }
    }

    pub fn parent(&self) -> Option<Rc<EffectInner>> {
        self.parent.borrow().as_ref().and_then(|w| w.upgrade())
    }

    pub fn set_parent(&self, parent: Option<Weak<EffectInner>>) {
        *self.parent.borrow_mut() = parent;
    }

    pub fn first_child(&self) -> Option<Rc<EffectInner>> {
        self.first_child.borrow().clone()
    }

    pub fn last_child(&self) -> Option<Rc<EffectInner>> {
        self.last_child.borrow().as_ref().and_then(|w| w.upgrade())
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        // An effect freed without an explicit destroy still runs its teardown.
        if let Some(cleanup) = self.teardown.borrow_mut().take() {
            cleanup();
        }
    }
}

impl AnyReaction for EffectInner {
    fn flags(&self) -> u32 {
        self.flags.get()
    }

    fn set_flags(&self, flags: u32) {
        self.flags.set(flags);
    }

    fn dep_count(&self) -> usize {
        self.deps.borrow().len()
    }

    fn add_dep(&self, source: Rc<dyn AnySource>) {
        self.deps.borrow_mut().push(source);
    }

    fn remove_deps_from(&self, start: usize) {
        self.deps.borrow_mut().truncate(start);
    }

    fn for_each_dep(&self, f: &mut dyn FnMut(&Rc<dyn AnySource>) -> bool) {
        for dep in self.deps.borrow().iter() {
            if !f(dep) {
                break;
            }
        }
    }

    fn remove_source(&self, source: &Rc<dyn AnySource>) {
        let ptr = Rc::as_ptr(source) as *const ();
        self.deps
            .borrow_mut()
            .retain(|dep| Rc::as_ptr(dep) as *const () != ptr);
    }

    fn update(&self) {
        if (self.flags.get() & DESTROYED) != 0 {
            return;
        }
        if let Some(rc_self) = self.self_weak.borrow().upgrade() {
            update_effect(&rc_self);
        }
    }

    fn sequence(&self) -> u64 {
        self.sequence
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_derived_source(&self) -> Option<Rc<dyn AnySource>> {
        None
    }
}

// =============================================================================
// EFFECT TREE MAINTENANCE
// =============================================================================

/// Append an effect to its parent's child list.
pub(crate) fn push_effect(effect: &Rc<EffectInner>, parent: &Rc<EffectInner>) {
    match parent.last_child() {
        None => {
            *parent.first_child.borrow_mut() = Some(effect.clone());
            *parent.last_child.borrow_mut() = Some(Rc::downgrade(effect));
        }
        Some(last) => {
            *last.next_sibling.borrow_mut() = Some(effect.clone());
            *effect.prev_sibling.borrow_mut() = Some(Rc::downgrade(&last));
            *parent.last_child.borrow_mut() = Some(Rc::downgrade(effect));
        }
    }
}

/// Remove an effect from its parent's child list.
fn unlink_effect(effect: &Rc<EffectInner>) {
    let prev = effect
        .prev_sibling
        .borrow()
        .as_ref()
        .and_then(|w| w.upgrade());
    let next = effect.next_sibling.borrow().clone();

    if let Some(ref prev_rc) = prev {
        *prev_rc.next_sibling.borrow_mut() = next.clone();
    }
    if let Some(ref next_rc) = next {
        *next_rc.prev_sibling.borrow_mut() = prev.as_ref().map(Rc::downgrade);
    }

    if let Some(parent) = effect.parent() {
        let is_first = parent
            .first_child
            .borrow()
            .as_ref()
            .is_some_and(|first| Rc::ptr_eq(first, effect));
        if is_first {
            *parent.first_child.borrow_mut() = next.clone();
        }

        let is_last = parent
            .last_child()
            .is_some_and(|last| Rc::ptr_eq(&last, effect));
        if is_last {
            *parent.last_child.borrow_mut() = prev.as_ref().map(Rc::downgrade);
        }
    }

    *effect.prev_sibling.borrow_mut() = None;
    *effect.next_sibling.borrow_mut() = None;
}

/// Run an effect's teardown function, if present.
pub(crate) fn execute_teardown(effect: &EffectInner) {
    let teardown = effect.teardown.borrow_mut().take();
    if let Some(cleanup) = teardown {
        cleanup();
    }
}

/// Destroy all children of an effect.
pub(crate) fn destroy_effect_children(effect: &Rc<EffectInner>) {
    let mut child = effect.first_child.borrow_mut().take();
    *effect.last_child.borrow_mut() = None;

    // Detach the whole chain first; a teardown must not observe a sibling
    // list that is being modified under it.
    let mut children = Vec::new();
    while let Some(c) = child {
        child = c.next_sibling.borrow_mut().take();
        *c.prev_sibling.borrow_mut() = None;
        children.push(c);
    }

    for child_rc in children {
        destroy_effect(child_rc, false);
    }
}

/// Destroy an effect and its whole subtree. Idempotent.
pub fn destroy_effect(effect: Rc<EffectInner>, remove_from_parent: bool) {
    if (effect.flags.get() & DESTROYED) != 0 {
        return;
    }

    destroy_effect_children(&effect);

    remove_reactions(effect.clone() as Rc<dyn AnyReaction>, 0);

    effect.mark_destroyed();

    execute_teardown(&effect);

    if remove_from_parent && effect.parent().is_some() {
        unlink_effect(&effect);
    }

    *effect.parent.borrow_mut() = None;
    *effect.func.borrow_mut() = None;
    *effect.teardown.borrow_mut() = None;
    effect.deps.borrow_mut().clear();
    *effect.first_child.borrow_mut() = None;
    *effect.last_child.borrow_mut() = None;
}

// =============================================================================
// UPDATE EFFECT
// =============================================================================

/// Run an effect and track its dependencies.
///
/// 1. Destroys child effects from the previous run
/// 2. Runs the previous teardown
/// 3. Executes the function with dependency tracking
/// 4. Re-links the dependency edges and stores the new teardown
pub fn update_effect(effect: &Rc<EffectInner>) {
    let flags = effect.flags.get();
    if (flags & DESTROYED) != 0 {
        return;
    }
    if (flags & REACTION_IS_UPDATING) != 0 {
        // The effect invalidated a cell it reads, directly or through a
        // cycle of effects. Fail loudly instead of recursing forever.
        panic!("maximum update depth exceeded: an effect re-triggered itself while running");
    }

    effect.mark_clean();

    destroy_effect_children(effect);
    execute_teardown(effect);

    let (prev_reaction, prev_effect, saved_deps) = with_context(|ctx| {
        let prev_r = ctx.set_active_reaction(Some(effect.as_weak_reaction()));
        let prev_e = ctx.set_active_effect(Some(effect.as_weak_reaction()));
        ctx.increment_read_version();
        // Save the enclosing reaction's partial collection; tracking is
        // re-entrant and must hand it back untouched.
        let saved = ctx.swap_new_deps(Vec::new());
        effect.set_flags(effect.flags() | REACTION_IS_UPDATING);
        (prev_r, prev_e, saved)
    });

    let teardown = {
        let mut func_borrow = effect.func.borrow_mut();
        match *func_borrow {
            Some(ref mut func) => func(),
            None => None,
        }
    };

    with_context(|ctx| {
        effect.set_flags(effect.flags() & !REACTION_IS_UPDATING);

        let new_deps = ctx.swap_new_deps(saved_deps);

        ctx.set_active_reaction(prev_reaction);
        ctx.set_active_effect(prev_effect);

        // Drop the previous run's edges, then install the fresh set.
        remove_reactions(effect.clone() as Rc<dyn AnyReaction>, 0);
        for dep in new_deps {
            effect.add_dep(dep.clone());
            dep.add_reaction(Rc::downgrade(&(effect.clone() as Rc<dyn AnyReaction>)));
        }
    });

    *effect.teardown.borrow_mut() = teardown;
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Create an effect that runs immediately and re-runs when any cell it read
/// is written.
///
/// Returns a dispose function that destroys the effect and its sub-effects.
///
/// # Example
///
/// ```
/// use cinder_signals::{state, effect};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let count = state(0);
/// let seen = Rc::new(Cell::new(0));
///
/// let dispose = effect({
///     let count = count.clone();
///     let seen = seen.clone();
///     move || seen.set(count.get())
/// });
///
/// count.set(7);
/// assert_eq!(seen.get(), 7);
///
/// dispose();
/// count.set(9);
/// assert_eq!(seen.get(), 7);
/// ```
pub fn effect<F>(mut f: F) -> impl FnOnce()
where
    F: FnMut() + 'static,
{
    effect_with_cleanup(move || {
        f();
        None
    })
}

/// Create an effect whose function may return a cleanup, run before each
/// re-execution and on disposal.
pub fn effect_with_cleanup<F>(f: F) -> impl FnOnce()
where
    F: FnMut() -> Option<CleanupFn> + 'static,
{
    let effect = create_effect(EFFECT, Box::new(f));
    move || destroy_effect(effect, true)
}

/// Check whether code is running inside a tracking context.
pub fn effect_tracking() -> bool {
    with_context(|ctx| ctx.has_active_reaction())
}

/// Create an effect record, parent it, register it with the active scope,
/// and run it once.
pub(crate) fn create_effect(effect_type: u32, func: EffectFn) -> Rc<EffectInner> {
    let effect = EffectInner::new(effect_type, Some(func));

    // A parent effect owns the record; only parentless effects belong to
    // the active scope directly.
    let parent = with_context(|ctx| ctx.get_active_effect().and_then(|w| w.upgrade()))
        .and_then(|parent_rc| {
            parent_rc
                .as_any()
                .downcast_ref::<EffectInner>()
                .and_then(|inner| inner.self_weak.borrow().upgrade())
        });

    match parent {
        Some(parent_effect) => {
            effect.set_parent(Some(Rc::downgrade(&parent_effect)));
            push_effect(&effect, &parent_effect);
        }
        None => register_effect_with_scope(&effect),
    }

    update_effect(&effect);
    effect
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::state::state;

    #[test]
    fn effect_runs_on_dependency_change() {
        let runs = Rc::new(Cell::new(0));
        let count = state(0);

        let _dispose = effect({
            let count = count.clone();
            let runs = runs.clone();
            move || {
                let _ = count.get();
                runs.set(runs.get() + 1);
            }
        });

        assert_eq!(runs.get(), 1);

        count.set(1);
        assert_eq!(runs.get(), 2);

        count.set(2);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn equal_value_still_triggers() {
        let runs = Rc::new(Cell::new(0));
        let count = state(5);

        let _dispose = effect({
            let count = count.clone();
            let runs = runs.clone();
            move || {
                let _ = count.get();
                runs.set(runs.get() + 1);
            }
        });

        count.set(5);
        count.set(5);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn cleanup_runs_before_rerun_and_on_dispose() {
        let cleanups = Rc::new(Cell::new(0));
        let count = state(0);

        let dispose = effect_with_cleanup({
            let count = count.clone();
            let cleanups = cleanups.clone();
            move || {
                let _ = count.get();
                let c = cleanups.clone();
                Some(Box::new(move || c.set(c.get() + 1)) as CleanupFn)
            }
        });

        assert_eq!(cleanups.get(), 0);

        count.set(1);
        assert_eq!(cleanups.get(), 1);

        dispose();
        assert_eq!(cleanups.get(), 2);
    }

    #[test]
    fn dispose_stops_reruns() {
        let runs = Rc::new(Cell::new(0));
        let count = state(0);

        let dispose = effect({
            let count = count.clone();
            let runs = runs.clone();
            move || {
                let _ = count.get();
                runs.set(runs.get() + 1);
            }
        });

        dispose();
        count.set(1);
        count.set(2);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn nested_effects_destroyed_on_parent_rerun() {
        let child_runs = Rc::new(Cell::new(0));
        let outer = state(0);
        let inner = state(0);

        let _dispose = effect({
            let outer = outer.clone();
            let inner = inner.clone();
            let child_runs = child_runs.clone();
            move || {
                let _ = outer.get();
                let inner = inner.clone();
                let child_runs = child_runs.clone();
                // Child is replaced on every outer re-run.
                let _child = effect(move || {
                    let _ = inner.get();
                    child_runs.set(child_runs.get() + 1);
                });
            }
        });

        assert_eq!(child_runs.get(), 1);

        inner.set(1);
        assert_eq!(child_runs.get(), 2);

        // Parent re-run destroys the old child and creates a fresh one.
        outer.set(1);
        assert_eq!(child_runs.get(), 3);

        // Only the fresh child reacts.
        inner.set(2);
        assert_eq!(child_runs.get(), 4);
    }

    #[test]
    fn nested_effects_destroyed_on_parent_dispose() {
        let child_runs = Rc::new(Cell::new(0));
        let inner = state(0);

        let dispose = effect({
            let inner = inner.clone();
            let child_runs = child_runs.clone();
            move || {
                let inner = inner.clone();
                let child_runs = child_runs.clone();
                let _child = effect(move || {
                    let _ = inner.get();
                    child_runs.set(child_runs.get() + 1);
                });
            }
        });

        assert_eq!(child_runs.get(), 1);

        dispose();
        inner.set(1);
        assert_eq!(child_runs.get(), 1);
    }

    #[test]
    fn effects_run_in_registration_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let count = state(0);

        for label in ["a", "b", "c"] {
            let count = count.clone();
            let order = order.clone();
            // Leak the disposer; the effect stays alive for the test.
            std::mem::forget(effect(move || {
                let _ = count.get();
                order.borrow_mut().push(label);
            }));
        }

        order.borrow_mut().clear();
        count.set(1);
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    #[should_panic(expected = "maximum update depth exceeded")]
    fn self_invalidating_effect_panics() {
        let count = state(0);
        let _dispose = effect({
            let count = count.clone();
            move || {
                let current = count.get();
                count.set(current + 1);
            }
        });

        // The first run had no dependency edges installed yet; the external
        // write closes the loop and must be detected.
        count.set(0);
    }

    #[test]
    fn destroy_is_idempotent() {
        let effect_rc = create_effect(EFFECT, Box::new(|| None));
        destroy_effect(effect_rc.clone(), true);
        destroy_effect(effect_rc, true);
    }
}
