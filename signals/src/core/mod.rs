// ============================================================================
// cinder-signals - Core Module
// ============================================================================

pub mod constants;
pub mod context;
pub mod types;
