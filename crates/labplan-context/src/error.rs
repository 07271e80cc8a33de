//! Error types for entity contexts
//!
//! Provides error handling for:
//! - Backend collaborator failures (lookup, create, update, query)
//! - Context lifecycle misuse (commit before create, double create, ...)
//! - Concurrent create/commit on one context
//!
//! Both enums are `Clone` because errors are carried on a context's committed
//! stream and every subscriber receives its own copy.

use labplan_resource::ResourceError;

/// Failures reported by the backend collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// No entity with this id
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Backend refused the request (validation, permissions, ...)
    #[error("backend rejected request: {0}")]
    Rejected(String),

    /// Request never completed
    #[error("transport error: {0}")]
    Transport(String),

    /// Request exceeded the configured timeout
    #[error("backend call timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Payload could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(String),
}

impl BackendError {
    /// Create a not-found error
    #[inline]
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether retrying the same call could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Context lifecycle and delegation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContextError {
    /// A source is already attached to this context
    #[error("{entity} context already has a source attached")]
    SourceAttached { entity: &'static str },

    /// `commit` called before any entity exists
    #[error("{entity} context has no committed entity; create it first")]
    NotCreated { entity: &'static str },

    /// `create` called on a context that already holds an entity
    #[error("{entity} context already holds a committed entity")]
    AlreadyCreated { entity: &'static str },

    /// Read before the source resolved
    #[error("{entity} context has not resolved yet")]
    NotReady { entity: &'static str },

    /// A create or commit is already running on this context
    #[error("a create or commit is already in progress on the {entity} context")]
    CommitInProgress { entity: &'static str },

    /// The context was disposed
    #[error("{entity} context was disposed")]
    Disposed { entity: &'static str },

    /// A second editing session tried to attach
    #[error("{entity} context already has an editing session")]
    SessionActive { entity: &'static str },

    /// Source attachment needs a Tokio runtime
    #[error("no tokio runtime available to drive the source")]
    NoRuntime,

    /// Backend collaborator failed
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Resource addressing or patching failed
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),
}

impl ContextError {
    /// Misuse of the context API rather than a runtime failure
    #[inline]
    #[must_use]
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::SourceAttached { .. }
                | Self::NotCreated { .. }
                | Self::AlreadyCreated { .. }
                | Self::NotReady { .. }
                | Self::NoRuntime
                | Self::Resource(ResourceError::OverlappingSplices { .. })
        )
    }

    /// Whether the caller can recover locally (re-query, retry later)
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::CommitInProgress { .. } => true,
            Self::Backend(err) => err.is_retryable(),
            Self::Resource(err) => err.is_recoverable(),
            _ => false,
        }
    }
}
