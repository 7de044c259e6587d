//! Error type shared by the abstract graph, the renderers and native hosts.

use thiserror::Error;

/// Errors surfaced by graph construction, rendering and native hosts.
///
/// The error is `Clone` because a failed render is memoized: every caller that
/// asks the same renderer for the same render target receives the same failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The node or context is in a state that forbids the operation
    /// (starting a source twice, rendering a context twice, ...).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The requested configuration has no native or fakeable equivalent.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// A structurally invalid connection or parameter value.
    #[error("Invalid access: {0}")]
    InvalidAccess(String),

    /// An out-of-range channel, input, output or buffer index.
    #[error("Index size: {0}")]
    IndexSize(String),
}

impl AudioError {
    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        AudioError::InvalidState(msg.into())
    }

    pub(crate) fn not_supported(msg: impl Into<String>) -> Self {
        AudioError::NotSupported(msg.into())
    }

    pub(crate) fn invalid_access(msg: impl Into<String>) -> Self {
        AudioError::InvalidAccess(msg.into())
    }

    pub(crate) fn index_size(msg: impl Into<String>) -> Self {
        AudioError::IndexSize(msg.into())
    }

    /// Whether this is a `NotSupported` error.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, AudioError::NotSupported(_))
    }
}

/// Result type for graph and rendering operations
pub type Result<T> = std::result::Result<T, AudioError>;
