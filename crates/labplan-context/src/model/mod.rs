//! Domain entities: plans, work units, funding models and single resources

mod funding;
mod plan;
mod resource_ctx;
mod work_unit;

pub use funding::{FundingModel, FundingModelId, FundingModelPatch};
pub use plan::{Plan, PlanId, PlanPatch};
pub use resource_ctx::{resource_source, ResourceKey, ResourceOps};
pub use work_unit::{WorkUnit, WorkUnitId, WorkUnitOps, WorkUnitPatch};
