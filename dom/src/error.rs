//! Error types.
//!
//! A mount error is recoverable per instance (the declared error render
//! takes over) or fatal to it. Protocol errors reject the `resolve` call;
//! everything else in the protocol client self-heals silently.

use thiserror::Error;

/// Failure raised while building a component's primary render.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct MountError {
    message: String,
}

impl MountError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for MountError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for MountError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Failure surfaced by the remote-update protocol client.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The structured store payload did not decode.
    #[error("failed to decode store payload: {0}")]
    Decode(#[from] serde_json::Error),

    /// The response body stream failed mid-read.
    #[error("failed to read response body: {0}")]
    Body(String),
}
