// ============================================================================
// cinder-signals - Fine-Grained Reactive Signals
// ============================================================================
//
// The reactive foundation of the cinder client runtime: writable state
// cells, lazily recomputed deriveds, eager effects forming a disposal tree,
// component scopes, and a per-key reactive store.
//
// Propagation is synchronous and unbatched by design. A write re-runs every
// dependent effect, in registration order, before the write returns; there
// is no equality skip and no microtask coalescing. The mount engine builds
// its anchored-replacement semantics on top of exactly these guarantees.
// ============================================================================

pub mod collections;
pub mod core;
pub mod primitives;
pub mod reactivity;

// Re-export core items at crate root for ergonomic access
pub use self::core::constants;
pub use self::core::context::{is_tracking, with_context, write_version, ReactiveContext};
pub use self::core::types::{AnyReaction, AnySource, SourceInner};

// Re-export primitives at crate root
pub use primitives::derived::{derived, Derived, DerivedInner};
pub use primitives::effect::{
    destroy_effect, effect, effect_tracking, effect_with_cleanup, CleanupFn, DisposeFn, EffectFn,
    EffectInner,
};
pub use primitives::scope::{Scope, ScopeCleanupFn};
pub use primitives::state::{state, State};

// Re-export reactivity functions
pub use reactivity::tracking::{mark_reactions, notify_write, remove_reactions, track_read};

// Re-export collections
pub use collections::Store;

// =============================================================================
// TESTS
// =============================================================================
