// ============================================================================
// cinder-signals - Primitives Module
// ============================================================================

pub mod derived;
pub mod effect;
pub mod scope;
pub mod state;
