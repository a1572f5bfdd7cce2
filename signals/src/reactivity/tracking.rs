// ============================================================================
// cinder-signals - Dependency Tracking
// Tracking reads and propagating writes through the graph
// ============================================================================
//
// RefCell discipline: collect-then-mutate. Every walk over a source's
// reactions list clones the live entries out before invoking anything that
// could re-enter the graph.
//
// Propagation is synchronous and unbatched: a write marks dependents dirty
// and re-runs every dirty effect, in registration order, before the write
// returns. There is no coalescing across writes; two writes in one turn mean
// two full flushes.
// ============================================================================

use std::rc::Rc;

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::{AnyReaction, AnySource};

/// Track a read of a source, registering it as a dependency of the reaction
/// currently executing (if any).
///
/// Called by `State::get` / `Derived::get` after reading the value.
pub fn track_read(source: Rc<dyn AnySource>) {
    with_context(|ctx| {
        let reaction = match ctx.get_active_reaction().and_then(|w| w.upgrade()) {
            Some(r) => r,
            None => return,
        };

        if (reaction.flags() & REACTION_IS_UPDATING) != 0 {
            // Inside a tracked run: dedupe per read cycle via the read version.
            let read_version = ctx.get_read_version();
            if source.read_version() < read_version {
                source.set_read_version(read_version);
                ctx.add_new_dep(source.clone());
            }
        } else {
            // Read outside an update cycle (e.g. a handler installed by the
            // reaction): link both sides directly.
            reaction.add_dep(source.clone());
            source.add_reaction(Rc::downgrade(&reaction));
        }
    });
}

/// Notify the graph that a source's value changed.
///
/// Panics when called from inside a derived computation; deriveds are pure.
pub fn notify_write(source: Rc<dyn AnySource>) {
    with_context(|ctx| {
        if let Some(reaction) = ctx.get_active_reaction().and_then(|w| w.upgrade()) {
            if (reaction.flags() & DERIVED) != 0 && (reaction.flags() & REACTION_IS_UPDATING) != 0
            {
                panic!("cannot write to state inside a derived computation");
            }
        }
    });

    mark_reactions(source);
}

/// Mark every reaction of a source dirty, cascade through deriveds, and run
/// the affected effects immediately.
///
/// Iterative with an explicit stack; deep derived chains must not overflow.
pub fn mark_reactions(source: Rc<dyn AnySource>) {
    let mut effects_to_run: Vec<Rc<dyn AnyReaction>> = Vec::new();
    let mut stack: Vec<Rc<dyn AnySource>> = vec![source];

    while let Some(current) = stack.pop() {
        current.cleanup_dead_reactions();

        let reactions: Vec<Rc<dyn AnyReaction>> = {
            let mut collected = Vec::new();
            current.for_each_reaction(&mut |reaction| {
                collected.push(reaction);
                true
            });
            collected
        };

        for reaction in reactions {
            let flags = reaction.flags();
            if (flags & DESTROYED) != 0 {
                continue;
            }
            let was_dirty = (flags & DIRTY) != 0;
            reaction.mark_dirty();

            if (flags & DERIVED) != 0 {
                // Cascade through the derived to its own dependents.
                if let Some(derived_source) = reaction.as_derived_source() {
                    stack.push(derived_source);
                }
            } else if !was_dirty && (flags & EFFECT) != 0 {
                effects_to_run.push(reaction);
            }
        }
    }

    // Registration order, regardless of how the dependency edges were
    // re-linked by earlier runs.
    effects_to_run.sort_by_key(|effect| effect.sequence());

    for effect in effects_to_run {
        if effect.is_dirty() && !effect.is_destroyed() {
            effect.update();
        }
    }
}

/// Unlink a reaction from its dependencies, starting at `start`.
///
/// Removes the reaction from each source's reactions list and truncates the
/// reaction's own deps list.
pub fn remove_reactions(reaction: Rc<dyn AnyReaction>, start: usize) {
    let deps: Vec<Rc<dyn AnySource>> = {
        let mut collected = Vec::new();
        reaction.for_each_dep(&mut |dep| {
            collected.push(dep.clone());
            true
        });
        collected
    };

    for dep in deps.iter().skip(start) {
        dep.remove_reaction(&reaction);
    }

    reaction.remove_deps_from(start);
}

// =============================================================================
// TESTS
// =============================================================================
