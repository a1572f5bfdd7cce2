// ============================================================================
// cinder-signals - Collections Module
// ============================================================================

pub mod store;

pub use store::Store;
