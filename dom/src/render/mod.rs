//! The mount engine and the UI description it consumes.

pub mod mount;
pub mod paths;
pub mod value;

pub use mount::{CssBlock, Mounter, REQUEST_CLASS};
pub use paths::PathConfig;
pub use value::{AttrValue, ChildFuture, Children, EventArg, EventHandler, UiNode};
