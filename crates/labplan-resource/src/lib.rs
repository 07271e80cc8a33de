//! Lab Plan Resources
//!
//! Typed lab resources, the splice patches that change them, and the
//! containers that hold them.
//!
//! # Core Concepts
//!
//! - [`Resource`]: Tagged union over the closed set of resource kinds
//! - [`ResourceKind`]: Kind tag and collection key
//! - [`ResourceRegistry`]: Per-kind JSON codec and draft template
//! - [`ResourceSplice`]: Range-replace `{start, end?, items}` over a collection
//! - [`ResourcePatch`]: Splices keyed by kind, optionally pinned to a base hash
//! - [`ResourceContainer`]: One dense collection per kind, immutable once built
//!
//! # Example
//!
//! ```rust,ignore
//! use labplan_resource::{EquipmentLease, ResourceContainer, ResourceKind, ResourcePatch, ResourceSplice};
//!
//! let container = ResourceContainer::from_resources(None, vec![EquipmentLease::new("L1").into()]);
//! let patch = ResourcePatch::new().with_splice(
//!     ResourceKind::EquipmentLease,
//!     ResourceSplice::insert(1, vec![EquipmentLease::new("L2").into()]),
//! );
//! let next = container.apply_patch(&patch)?;
//! assert_eq!(next.count(ResourceKind::EquipmentLease), 2);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod container;
mod error;
mod hash;
mod kind;
mod patch;
mod registry;
mod resource;
mod splice;

/// Concrete resource variants
pub mod types;

pub use container::{apply_patch, ResourceContainer};
pub use error::ResourceError;
pub use hash::{ContentHash, HashError};
pub use kind::ResourceKind;
pub use patch::ResourcePatch;
pub use registry::{DraftFactoryFn, FromJsonFn, ResourceCodec, ResourceRegistry, ToJsonFn};
pub use resource::Resource;
pub use splice::{apply_splices, check_bounds, check_disjoint, ResourceSplice};
pub use types::{
    ContainerId, EquipmentLease, InputMaterial, OutputMaterial, ResourceMeta, ResourceVariant,
    Service, Software,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
