//! Lab Plan Drafts
//!
//! Uncommitted additions and edits to a work unit's resources, kept apart
//! from the committed container until they are compiled into one patch.
//!
//! # Core Concepts
//!
//! - [`ResourceDraft`]: Field values of one new or edited resource, validated through the registry
//! - [`DraftBucket`]: Add drafts in creation order plus replace drafts keyed by committed index
//! - [`DraftSync`]: Editing session bound to one container context; compiles and commits drafts
//! - [`DraftError`]: Validation and lifecycle failures surfaced to the editor
//!
//! # Example
//!
//! ```rust,ignore
//! use labplan_draft::DraftSync;
//! use labplan_resource::ResourceKind;
//!
//! let sync = DraftSync::attach(&work_unit, &config)?;
//! let lease = sync.begin_create(ResourceKind::EquipmentLease)?;
//! sync.set_field(lease, "name", "confocal microscope".into())?;
//! let committed = sync.commit_all().await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod bucket;
mod draft;
mod error;
mod sync;

pub use bucket::DraftBucket;
pub use draft::{DraftIssue, DraftState, ResourceDraft};
pub use error::{DraftError, DraftSlot, InvalidEntry};
pub use sync::{DraftHandle, DraftSync};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
