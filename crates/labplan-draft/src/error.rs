//! Draft layer errors

use crate::draft::DraftIssue;
use labplan_context::ContextError;
use labplan_resource::{ResourceError, ResourceKind};
use std::fmt;

/// Where an open draft lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DraftSlot {
    /// Position in the kind's add bucket
    Create(usize),
    /// Committed position the draft replaces
    Replace(usize),
}

impl fmt::Display for DraftSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create(i) => write!(f, "new #{i}"),
            Self::Replace(i) => write!(f, "replace @{i}"),
        }
    }
}

/// One draft that failed validation
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidEntry {
    pub kind: ResourceKind,
    pub slot: DraftSlot,
    pub issues: Vec<DraftIssue>,
}

/// Draft synchronization errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DraftError {
    /// Committed position outside the kind's collection
    #[error("{kind} index {index} out of range (len {len})")]
    IndexOutOfRange {
        kind: ResourceKind,
        index: usize,
        len: usize,
    },

    /// At least one open draft failed validation; nothing was committed
    #[error("{} draft(s) failed validation", .0.len())]
    InvalidDraft(Vec<InvalidEntry>),

    /// A handle that no longer addresses an open draft
    #[error("no open {kind} draft at {slot}")]
    NoSuchDraft { kind: ResourceKind, slot: DraftSlot },

    /// Another editing session holds the context
    #[error("{entity} context already has an editing session")]
    SessionActive { entity: &'static str },

    /// Context lifecycle or backend failure
    #[error(transparent)]
    Context(ContextError),

    /// Resource encoding or patching failed
    #[error(transparent)]
    Resource(ResourceError),
}

impl From<ResourceError> for DraftError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::IndexOutOfRange { kind, index, len } => {
                Self::IndexOutOfRange { kind, index, len }
            }
            other => Self::Resource(other),
        }
    }
}

impl From<ContextError> for DraftError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::SessionActive { entity } => Self::SessionActive { entity },
            ContextError::Resource(err) => err.into(),
            other => Self::Context(other),
        }
    }
}

impl DraftError {
    /// Validation failures, if this is `InvalidDraft`
    #[must_use]
    pub fn invalid_entries(&self) -> &[InvalidEntry] {
        match self {
            Self::InvalidDraft(entries) => entries,
            _ => &[],
        }
    }
}
