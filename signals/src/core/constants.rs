// ============================================================================
// cinder-signals - Flag Constants
// Bitmask flags for reactive graph nodes
// ============================================================================

/// Node is a writable state cell.
pub const SOURCE: u32 = 1 << 0;

/// Node is a derived computation (both source and reaction).
pub const DERIVED: u32 = 1 << 1;

/// Node is an effect.
pub const EFFECT: u32 = 1 << 2;

/// Node is up to date.
pub const CLEAN: u32 = 1 << 10;

/// Node must recompute / re-run.
pub const DIRTY: u32 = 1 << 11;

/// Node has been disposed and must never run again.
pub const DESTROYED: u32 = 1 << 13;

/// Reaction is currently executing its function.
pub const REACTION_IS_UPDATING: u32 = 1 << 14;

/// Mask that clears the status bits while preserving everything else.
pub const STATUS_MASK: u32 = !(CLEAN | DIRTY);
