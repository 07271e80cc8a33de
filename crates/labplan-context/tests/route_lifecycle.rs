//! Routed contexts over the in-memory backend

use futures::{stream, StreamExt};
use labplan_context::route;
use labplan_context::source;
use labplan_context::{
    BackendError, Committed, Context, ContextError, LabConfig, PlanId, PlanPatch, WorkUnitPatch,
};
use labplan_resource::{EquipmentLease, ResourceKind};
use labplan_test_utils::{lease, software, wait_until, LabBackends, Spy};
use pretty_assertions::assert_eq;
use std::time::Duration;

#[tokio::test]
async fn reparenting_tears_down_the_previous_source_once() {
    let backends = LabBackends::new();
    let first = backends.seed_plan("First");
    let second = backends.seed_plan("Second");
    let ctx: Context<_, PlanPatch> = Context::from_backend(backends.plan_backend());

    let spy = Spy::new();
    let (feed, upstream) = source::manual();
    let _old = ctx.send_committed(spy.wrap(upstream).boxed()).unwrap();
    feed.send(first);
    assert_eq!(ctx.resolved().await.unwrap().title, "First");

    let _new = ctx
        .send_committed(source::fetch_by_id(
            backends.plan_backend(),
            stream::iter([second.id]),
        ))
        .unwrap();
    assert_eq!(spy.teardowns(), 1);
    assert!(feed.is_closed());

    assert_eq!(ctx.resolved().await.unwrap().title, "Second");
    assert_eq!(spy.teardowns(), 1);
}

#[tokio::test]
async fn work_unit_waits_for_its_plan() {
    let backends = LabBackends::new();
    let config = LabConfig::default();
    let plan = backends.seed_plan("Gated");
    backends.seed_work_unit(&plan, "Prep", vec![lease("hood")]);
    backends.plans.set_latency(Duration::from_millis(50));

    let (plan_ctx, _plan_guard) =
        route::plan_context_from_route(backends.plan_backend(), stream::iter([plan.id]), &config)
            .unwrap();
    let (unit_ctx, _unit_guard) = route::work_unit_context_from_route(
        &plan_ctx,
        backends.work_unit_backend(),
        stream::iter([0]),
        &config,
    )
    .unwrap();

    assert!(matches!(unit_ctx.committed(), Committed::Pending));
    assert_eq!(backends.work_units.calls("query"), 0);

    let unit = unit_ctx.resolved().await.unwrap();
    assert!(plan_ctx.entity().is_ok());
    assert_eq!(unit.name, "Prep");
    assert_eq!(unit.plan_id, plan.id);
}

#[tokio::test]
async fn work_unit_create_takes_the_plan_id() {
    let backends = LabBackends::new();
    let config = LabConfig::default();
    let plan = backends.seed_plan("Parent");
    let (plan_ctx, _plan_guard) =
        route::plan_context_from_route(backends.plan_backend(), stream::iter([plan.id]), &config)
            .unwrap();
    let (unit_ctx, _unit_guard) =
        route::work_unit_create_context(&plan_ctx, backends.work_unit_backend(), &config).unwrap();

    assert_eq!(
        unit_ctx.create(WorkUnitPatch::new().with_name("Early")).await.unwrap_err(),
        ContextError::NotReady { entity: "plan" }
    );

    plan_ctx.resolved().await.unwrap();
    let created = unit_ctx
        .create(WorkUnitPatch::new().with_name("Analysis"))
        .await
        .unwrap();
    assert_eq!(created.plan_id, plan.id);
    assert_eq!(unit_ctx.entity().unwrap().id, created.id);
    assert_eq!(
        unit_ctx.create(WorkUnitPatch::new().with_name("Again")).await.unwrap_err(),
        ContextError::AlreadyCreated { entity: "work unit" }
    );
}

#[tokio::test]
async fn concurrent_commit_is_rejected() {
    let backends = LabBackends::new();
    let config = LabConfig::default();
    let plan = backends.seed_plan("Busy");
    let (ctx, _guard) =
        route::plan_context_from_route(backends.plan_backend(), stream::iter([plan.id]), &config)
            .unwrap();
    ctx.resolved().await.unwrap();
    backends.plans.set_latency(Duration::from_millis(30));

    let (first, second) = futures::join!(
        ctx.commit(PlanPatch::new().with_researcher("Ada")),
        ctx.commit(PlanPatch::new().with_researcher("Grace")),
    );
    assert_eq!(first.unwrap().researcher, "Ada");
    assert_eq!(
        second.unwrap_err(),
        ContextError::CommitInProgress { entity: "plan" }
    );
    assert_eq!(backends.plans.calls("update"), 1);
    assert_eq!(ctx.entity().unwrap().researcher, "Ada");
}

#[tokio::test]
async fn slow_backend_times_out() {
    let backends = LabBackends::new();
    let config = LabConfig::new().with_backend_timeout(Duration::from_millis(10));
    let plan = backends.seed_plan("Slow");
    let (ctx, _guard) =
        route::plan_context_from_route(backends.plan_backend(), stream::iter([plan.id]), &config)
            .unwrap();
    ctx.resolved().await.unwrap();
    backends.plans.set_latency(Duration::from_millis(200));

    assert_eq!(
        ctx.commit(PlanPatch::new().with_campus("North")).await.unwrap_err(),
        ContextError::Backend(BackendError::Timeout { millis: 10 })
    );
    assert_eq!(ctx.entity().unwrap().campus, plan.campus);
}

#[tokio::test]
async fn missing_plan_fails_the_context() {
    let backends = LabBackends::new();
    let config = LabConfig::default();
    let (ctx, _guard) = route::plan_context_from_route(
        backends.plan_backend(),
        stream::iter([PlanId::new()]),
        &config,
    )
    .unwrap();

    let err = ctx.resolved().await.unwrap_err();
    assert!(matches!(
        err,
        ContextError::Backend(BackendError::NotFound { entity: "plan", .. })
    ));
    let mut entities = ctx.entities();
    assert!(entities.next().await.unwrap().is_err());
    assert!(entities.next().await.is_none());
}

#[tokio::test]
async fn funding_model_follows_the_selected_name() {
    let backends = LabBackends::new();
    let config = LabConfig::default();
    backends.seed_funding_model("Internal");
    backends.seed_funding_model("External");

    let (ctx, _guard) = route::funding_model_from_selection(
        backends.funding_backend(),
        stream::iter(["External".to_string()]),
        &config,
    )
    .unwrap();
    assert_eq!(ctx.resolved().await.unwrap().name, "External");

    let (missing, _guard) = route::funding_model_from_selection(
        backends.funding_backend(),
        stream::iter(["Philanthropic".to_string()]),
        &config,
    )
    .unwrap();
    assert!(matches!(
        missing.resolved().await,
        Err(ContextError::Backend(BackendError::NotFound { .. }))
    ));
}

#[tokio::test]
async fn resource_commit_replaces_within_the_work_unit() {
    let backends = LabBackends::new();
    let config = LabConfig::default();
    let plan = backends.seed_plan("Imaging");
    backends.seed_work_unit(&plan, "Acquire", vec![lease("confocal"), software("Fiji")]);

    let (plan_ctx, _p) =
        route::plan_context_from_route(backends.plan_backend(), stream::iter([plan.id]), &config)
            .unwrap();
    let (unit_ctx, _u) = route::work_unit_context_from_route(
        &plan_ctx,
        backends.work_unit_backend(),
        stream::iter([0]),
        &config,
    )
    .unwrap();
    let (resource_ctx, _r) = route::resource_context_from_route(
        &unit_ctx,
        stream::iter([(ResourceKind::EquipmentLease, 0)]),
        &config,
    )
    .unwrap();
    assert_eq!(resource_ctx.resolved().await.unwrap().name(), "confocal");

    let updated = resource_ctx
        .commit(EquipmentLease::new("confocal").with_quantity(2).into())
        .await
        .unwrap();
    assert_eq!(updated.index(), 0);

    let unit = unit_ctx.entity().unwrap();
    let committed = unit.resources.resource_at(ResourceKind::EquipmentLease, 0).unwrap();
    assert!(committed.same_content(&updated));
    assert_eq!(unit.resources.count(ResourceKind::Software), 1);

    assert!(
        wait_until(Duration::from_secs(1), || {
            resource_ctx
                .entity()
                .is_ok_and(|r| r.same_content(&updated))
        })
        .await
    );

    assert!(matches!(
        resource_ctx.commit(software("Fiji")).await,
        Err(ContextError::Resource(_))
    ));
}

#[tokio::test]
async fn resource_create_appends_to_the_work_unit() {
    let backends = LabBackends::new();
    let config = LabConfig::default();
    let plan = backends.seed_plan("Imaging");
    backends.seed_work_unit(&plan, "Acquire", vec![lease("confocal")]);
    let (plan_ctx, _p) =
        route::plan_context_from_route(backends.plan_backend(), stream::iter([plan.id]), &config)
            .unwrap();
    let (unit_ctx, _u) = route::work_unit_context_from_route(
        &plan_ctx,
        backends.work_unit_backend(),
        stream::iter([0]),
        &config,
    )
    .unwrap();
    unit_ctx.resolved().await.unwrap();

    let (resource_ctx, _r) = route::resource_create_context(&unit_ctx, &config).unwrap();
    let created = resource_ctx.create(lease("incubator")).await.unwrap();
    assert_eq!(created.index(), 1);
    assert_eq!(
        unit_ctx.entity().unwrap().resources.count(ResourceKind::EquipmentLease),
        2
    );
}

#[test]
fn config_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labplan.toml");
    std::fs::write(
        &path,
        "backend_timeout_ms = 250\ninvalidate_stale_drafts = false\n",
    )
    .unwrap();

    let config = LabConfig::load(&path).unwrap();
    assert_eq!(config.backend_timeout(), Some(Duration::from_millis(250)));
    assert!(!config.invalidate_stale_drafts);
    assert_eq!(config.log_filter, "info");
}
