//! Lab Plan Contexts
//!
//! The commit/create lifecycle and source reparenting shared by every entity.
//!
//! # Core Concepts
//!
//! - [`Context`]: One committed value, its stream, and at most one upstream source
//! - [`EntityOps`]: Injected create/update pair; parent keys are merged here
//! - [`Backend`]: Persistence collaborator (`fetch`, `create`, `update`, `query`)
//! - [`source`]: Builders for upstream sources (fixed, by id, child of a parent, selection)
//! - [`route`]: Contexts wired from resolved route parameters
//! - [`model`]: Plans, work units, funding models and single resources
//!
//! # Example
//!
//! ```rust,ignore
//! use labplan_context::{route, LabConfig, PlanPatch};
//!
//! let (plan, _guard) = route::plan_create_context(backend, &LabConfig::default())?;
//! let created = plan.create(PlanPatch::new().with_title("Live imaging")).await?;
//! assert_eq!(plan.entity()?.id, created.id);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod backend;
mod config;
mod context;
mod entity;
mod error;

pub mod model;
pub mod route;
pub mod source;

pub use backend::{Backend, BackendOps};
pub use config::{ConfigError, LabConfig};
pub use context::{
    Committed, Context, DisposeHook, EntityOps, FnOps, SessionClaim, Snapshot, SourceGuard,
};
pub use entity::{ContainerEntity, Entity, EntityJson, EntityPatch};
pub use error::{BackendError, ContextError};
pub use model::{
    FundingModel, FundingModelId, FundingModelPatch, Plan, PlanId, PlanPatch, ResourceKey,
    WorkUnit, WorkUnitId, WorkUnitPatch,
};
pub use source::EntityStream;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
