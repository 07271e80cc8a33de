//! Contexts built from resolved route parameters
//!
//! The routing collaborator supplies streams of identifiers and indices.
//! These helpers turn them into contexts wired to the right upstream source:
//! a plan by id, a work unit by index within the current plan, and a
//! resource by kind and index within the current work unit.

use crate::backend::Backend;
use crate::config::LabConfig;
use crate::context::{Context, SourceGuard};
use crate::entity::Entity;
use crate::error::{BackendError, ContextError};
use crate::model::{
    resource_source, FundingModel, FundingModelPatch, Plan, PlanId, PlanPatch, ResourceOps,
    WorkUnit, WorkUnitOps, WorkUnitPatch,
};
use crate::source::{child_of, fetch_by_id, selected};
use futures::future::FutureExt;
use futures::{Stream, StreamExt};
use labplan_resource::{Resource, ResourceKind};
use serde_json::json;
use std::sync::Arc;

/// Context plus the guard that keeps its source attached
pub type Routed<E, P> = (Context<E, P>, SourceGuard);

/// Plan context following a stream of plan ids
///
/// # Errors
/// Returns `NoRuntime` outside a Tokio runtime
pub fn plan_context_from_route(
    backend: Arc<dyn Backend<Plan>>,
    plan_ids: impl Stream<Item = PlanId> + Send + 'static,
    config: &LabConfig,
) -> Result<Routed<Plan, PlanPatch>, ContextError> {
    let ctx = Context::<Plan, PlanPatch>::from_backend(Arc::clone(&backend))
        .with_timeout(config.backend_timeout());
    let guard = ctx.send_committed(fetch_by_id(backend, plan_ids))?;
    Ok((ctx, guard))
}

/// Plan context for a plan that does not exist yet
///
/// # Errors
/// Never fails on a fresh context; kept fallible for symmetry
pub fn plan_create_context(
    backend: Arc<dyn Backend<Plan>>,
    config: &LabConfig,
) -> Result<Routed<Plan, PlanPatch>, ContextError> {
    let ctx = Context::<Plan, PlanPatch>::from_backend(backend)
        .with_timeout(config.backend_timeout());
    let guard = ctx.init_create_context()?;
    Ok((ctx, guard))
}

async fn work_unit_at(
    backend: Arc<dyn Backend<WorkUnit>>,
    plan: Arc<Plan>,
    index: usize,
) -> Result<WorkUnit, ContextError> {
    let found = backend
        .query(json!({ "planId": plan.id, "index": index }))
        .await?
        .into_iter()
        .next();
    found.ok_or_else(|| {
        BackendError::not_found(WorkUnit::NAME, format!("{}#{index}", plan.id)).into()
    })
}

fn work_unit_context(
    plan: &Context<Plan, PlanPatch>,
    backend: &Arc<dyn Backend<WorkUnit>>,
    config: &LabConfig,
) -> Context<WorkUnit, WorkUnitPatch> {
    Context::<WorkUnit, WorkUnitPatch>::with_config(
        Arc::new(WorkUnitOps::new(Arc::clone(backend), plan.clone())),
        config,
    )
}

/// Work-unit context following a stream of indices within `plan`
///
/// The work unit does not resolve until `plan` has.
///
/// # Errors
/// Returns `NoRuntime` outside a Tokio runtime
pub fn work_unit_context_from_route(
    plan: &Context<Plan, PlanPatch>,
    backend: Arc<dyn Backend<WorkUnit>>,
    indices: impl Stream<Item = usize> + Send + 'static,
    config: &LabConfig,
) -> Result<Routed<WorkUnit, WorkUnitPatch>, ContextError> {
    let ctx = work_unit_context(plan, &backend, config);
    let source = child_of(plan, indices, move |plan, index| {
        work_unit_at(Arc::clone(&backend), plan, index).boxed()
    });
    let guard = ctx.send_committed(source)?;
    Ok((ctx, guard))
}

/// Work-unit context for a new unit under `plan`
///
/// `create` merges the plan's id into the patch.
///
/// # Errors
/// Never fails on a fresh context; kept fallible for symmetry
pub fn work_unit_create_context(
    plan: &Context<Plan, PlanPatch>,
    backend: Arc<dyn Backend<WorkUnit>>,
    config: &LabConfig,
) -> Result<Routed<WorkUnit, WorkUnitPatch>, ContextError> {
    let ctx = work_unit_context(plan, &backend, config);
    let guard = ctx.init_create_context()?;
    Ok((ctx, guard))
}

/// Resource context following `(kind, index)` addresses within `work_unit`
///
/// # Errors
/// Returns `NoRuntime` outside a Tokio runtime
pub fn resource_context_from_route(
    work_unit: &Context<WorkUnit, WorkUnitPatch>,
    addresses: impl Stream<Item = (ResourceKind, usize)> + Send + 'static,
    config: &LabConfig,
) -> Result<Routed<Resource, Resource>, ContextError> {
    let ctx = Context::<Resource, Resource>::with_config(
        Arc::new(ResourceOps::new(work_unit.clone())),
        config,
    );
    let guard = ctx.send_committed(resource_source(work_unit, addresses))?;
    Ok((ctx, guard))
}

/// Resource context for a new resource appended to `work_unit`
///
/// # Errors
/// Never fails on a fresh context; kept fallible for symmetry
pub fn resource_create_context(
    work_unit: &Context<WorkUnit, WorkUnitPatch>,
    config: &LabConfig,
) -> Result<Routed<Resource, Resource>, ContextError> {
    let ctx = Context::<Resource, Resource>::with_config(
        Arc::new(ResourceOps::new(work_unit.clone())),
        config,
    );
    let guard = ctx.init_create_context()?;
    Ok((ctx, guard))
}

/// Funding-model context following a stream of selected names
///
/// # Errors
/// Returns `NoRuntime` outside a Tokio runtime
pub fn funding_model_from_selection(
    backend: Arc<dyn Backend<FundingModel>>,
    names: impl Stream<Item = String> + Send + 'static,
    config: &LabConfig,
) -> Result<Routed<FundingModel, FundingModelPatch>, ContextError> {
    let ctx = Context::<FundingModel, FundingModelPatch>::from_backend(Arc::clone(&backend))
        .with_timeout(config.backend_timeout());
    let filters = names.map(|name| json!({ "name": name }));
    let guard = ctx.send_committed(selected(backend, filters))?;
    Ok((ctx, guard))
}
