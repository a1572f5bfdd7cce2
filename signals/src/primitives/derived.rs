// ============================================================================
// cinder-signals - Derived Cells
// Lazily recomputed cells derived from other cells
// ============================================================================
//
// A derived is both a source (things depend on it) and a reaction (it
// depends on things). A write to any dependency marks it dirty and cascades
// to its own dependents; the value is only recomputed on the next read.
//
// Derived functions must be pure. There is no cycle detection: a derived
// that reads itself transitively is a programming error and will blow the
// RefCell borrow at runtime.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::{AnyReaction, AnySource};
use crate::reactivity::tracking::{remove_reactions, track_read};

/// The inner data for a derived cell.
pub struct DerivedInner<T> {
    flags: Cell<u32>,
    value: RefCell<Option<T>>,
    func: RefCell<Box<dyn FnMut() -> T>>,
    write_version: Cell<u32>,
    read_version: Cell<u32>,

    /// Sources this derived read during its last computation.
    deps: RefCell<Vec<Rc<dyn AnySource>>>,

    /// Reactions depending on this derived.
    reactions: RefCell<Vec<Weak<dyn AnyReaction>>>,

    self_weak: RefCell<Weak<DerivedInner<T>>>,
}

impl<T: 'static> DerivedInner<T> {
    pub fn new(func: Box<dyn FnMut() -> T>) -> Rc<Self> {
        let inner = Rc::new(Self {
            flags: Cell::new(DERIVED | DIRTY),
            value: RefCell::new(None),
            func: RefCell::new(func),
            write_version: Cell::new(0),
            read_version: Cell::new(0),
            deps: RefCell::new(Vec::new()),
            reactions: RefCell::new(Vec::new()),
            self_weak: RefCell::new(Weak::new()),
        });
        *inner.self_weak.borrow_mut() = Rc::downgrade(&inner);
        inner
    }

    fn as_weak_reaction(&self) -> Weak<dyn AnyReaction> {
        if let Some(rc) = self.self_weak.borrow().upgrade() {
            Rc::downgrade(&(rc as Rc<dyn AnyReaction>))
        } else {
            Weak::<DerivedInner<T>>::new() as Weak<dyn AnyReaction>
        }
    }

    /// Recompute the value with dependency tracking.
    fn recompute(&self) {
        let this = self
            .self_weak
            .borrow()
            .upgrade()
            .expect("derived alive while in use");

        let (prev_reaction, saved_deps) = with_context(|ctx| {
            let prev = ctx.set_active_reaction(Some(self.as_weak_reaction()));
            ctx.increment_read_version();
            // Hand the enclosing reaction's partial collection back after
            // this computation; tracking is re-entrant.
            let saved = ctx.swap_new_deps(Vec::new());
            self.flags.set(self.flags.get() | REACTION_IS_UPDATING);
            (prev, saved)
        });

        let value = {
            let mut func_borrow = self.func.borrow_mut();
            let func: &mut dyn FnMut() -> T = &mut **func_borrow;
            func()
        };

        with_context(|ctx| {
            self.flags.set(self.flags.get() & !REACTION_IS_UPDATING);
            let new_deps = ctx.swap_new_deps(saved_deps);
            ctx.set_active_reaction(prev_reaction);

            remove_reactions(this.clone() as Rc<dyn AnyReaction>, 0);
            for dep in new_deps {
                self.add_dep(dep.clone());
                dep.add_reaction(Rc::downgrade(&(this.clone() as Rc<dyn AnyReaction>)));
            }

            self.write_version.set(ctx.increment_write_version());
        });

        *self.value.borrow_mut() = Some(value);
        AnySource::mark_clean(self);
    }
}

impl<T: 'static> AnySource for DerivedInner<T> {
    fn flags(&self) -> u32 {
        self.flags.get()
    }

    fn set_flags(&self, flags: u32) {
        self.flags.set(flags);
    }

    fn write_version(&self) -> u32 {
        self.write_version.get()
    }

    fn set_write_version(&self, version: u32) {
        self.write_version.set(version);
    }

    fn read_version(&self) -> u32 {
        self.read_version.get()
    }

    fn set_read_version(&self, version: u32) {
        self.read_version.set(version);
    }

    fn reaction_count(&self) -> usize {
        self.reactions
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    fn add_reaction(&self, reaction: Weak<dyn AnyReaction>) {
        self.reactions.borrow_mut().push(reaction);
    }

    fn cleanup_dead_reactions(&self) {
        self.reactions.borrow_mut().retain(|w| w.strong_count() > 0);
    }

    fn for_each_reaction(&self, f: &mut dyn FnMut(Rc<dyn AnyReaction>) -> bool) {
        let live: Vec<Rc<dyn AnyReaction>> = self
            .reactions
            .borrow()
            .iter()
            .filter_map(|w| w.upgrade())
            .collect();
        for reaction in live {
            if !f(reaction) {
                break;
            }
        }
    }

    fn remove_reaction(&self, reaction: &Rc<dyn AnyReaction>) {
        let ptr = Rc::as_ptr(reaction) as *const ();
        self.reactions.borrow_mut().retain(|weak| {
            if let Some(rc) = weak.upgrade() {
                Rc::as_ptr(&rc) as *const () != ptr
            } else {
                false
            }
        });
    }

    fn clear_reactions(&self) {
        self.reactions.borrow_mut().clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: 'static> AnyReaction for DerivedInner<T> {
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
        // Lazy: stay dirty until the next read recomputes.
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_derived_source(&self) -> Option<Rc<dyn AnySource>> {
        self.self_weak
            .borrow()
            .upgrade()
            .map(|rc| rc as Rc<dyn AnySource>)
    }
}

// =============================================================================
// DERIVED<T> - The public handle
// =============================================================================

/// A cell computed from other cells, recomputed lazily when read after any
/// dependency changed.
///
/// # Example
///
/// ```
/// use cinder_signals::{state, derived};
///
/// let count = state(2);
/// let doubled = derived({
///     let count = count.clone();
///     move || count.get() * 2
/// });
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Derived<T> {
    inner: Rc<DerivedInner<T>>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Derived<T> {
    /// Get the current value, recomputing if a dependency changed.
    ///
    /// In a reactive context this registers the derived as a dependency.
    pub fn get(&self) -> T {
        track_read(self.inner.clone() as Rc<dyn AnySource>);

        if AnySource::is_dirty(&*self.inner) || self.inner.value.borrow().is_none() {
            self.inner.recompute();
        }

        self.inner
            .value
            .borrow()
            .clone()
            .expect("derived value present after recompute")
    }
}

impl<T: 'static> Derived<T> {
    pub fn inner(&self) -> &Rc<DerivedInner<T>> {
        &self.inner
    }
}

/// Create a derived cell from a pure computation.
pub fn derived<T, F>(f: F) -> Derived<T>
where
    T: Clone + 'static,
    F: FnMut() -> T + 'static,
{
    Derived {
        inner: DerivedInner::new(Box::new(f)),
    }
}

// =============================================================================
// TESTS
// =============================================================================
