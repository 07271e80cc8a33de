//! Errors for resource containers and patches

use crate::hash::ContentHash;
use crate::kind::ResourceKind;

/// Errors raised while addressing, decoding or patching resources
///
/// Cloneable so it can travel on a context's committed stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResourceError {
    /// Position outside `[0, len)`
    #[error("{kind} index {index} out of range (len {len})")]
    IndexOutOfRange {
        kind: ResourceKind,
        index: usize,
        len: usize,
    },

    /// Two splices for the same kind touch the same range
    #[error("overlapping {kind} splices: [{}, {}) and [{}, {})", .first.0, .first.1, .second.0, .second.1)]
    OverlappingSplices {
        kind: ResourceKind,
        first: (usize, usize),
        second: (usize, usize),
    },

    /// Splice `end` precedes `start`
    #[error("{kind} splice ends before it starts: start {start}, end {end}")]
    InvertedSplice {
        kind: ResourceKind,
        start: usize,
        end: usize,
    },

    /// Splice range reaches past the collection
    #[error("{kind} splice [{start}, {end}) out of bounds (len {len})")]
    SpliceOutOfBounds {
        kind: ResourceKind,
        start: usize,
        end: usize,
        len: usize,
    },

    /// A splice item does not belong to the splice's collection
    #[error("{expected} splice carries a {actual} item")]
    KindMismatch {
        expected: ResourceKind,
        actual: ResourceKind,
    },

    /// Patch was compiled against a different container state
    #[error("patch base {expected} does not match container {actual}")]
    BaseMismatch {
        expected: ContentHash,
        actual: ContentHash,
    },

    /// Kind tag not known to the registry
    #[error("unknown resource kind: {0}")]
    UnknownKind(String),

    /// JSON could not be decoded or encoded
    #[error("codec error in {context}: {message}")]
    Codec { context: String, message: String },
}

impl ResourceError {
    /// Build a codec error from any displayable cause
    #[inline]
    pub fn codec(context: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Codec {
            context: context.into(),
            message: cause.to_string(),
        }
    }

    /// Whether the caller can recover by re-reading the container
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::IndexOutOfRange { .. } | Self::BaseMismatch { .. })
    }
}

impl From<crate::hash::HashError> for ResourceError {
    fn from(err: crate::hash::HashError) -> Self {
        Self::codec("content hash", err)
    }
}
