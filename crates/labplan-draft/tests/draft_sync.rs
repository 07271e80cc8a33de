//! Draft sessions against routed work-unit contexts and the in-memory backend

use futures::stream;
use labplan_context::route::{self, Routed};
use labplan_context::{ContextError, LabConfig, Plan, PlanPatch, WorkUnit, WorkUnitPatch};
use labplan_draft::{DraftError, DraftIssue, DraftSlot, DraftState, DraftSync};
use labplan_resource::{ResourceKind, ResourcePatch, ResourceSplice};
use labplan_test_utils::{lease, service, software, wait_until, LabBackends};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

struct Fixture {
    backends: LabBackends,
    config: LabConfig,
    _plan: Routed<Plan, PlanPatch>,
    unit: Routed<WorkUnit, WorkUnitPatch>,
}

async fn fixture() -> Fixture {
    let backends = LabBackends::new();
    let config = LabConfig::default();
    let plan = backends.seed_plan("Organoid imaging");
    backends.seed_work_unit(
        &plan,
        "Acquisition",
        vec![lease("confocal"), lease("lightsheet"), software("Fiji"), service("sequencing")],
    );

    let routed_plan =
        route::plan_context_from_route(backends.plan_backend(), stream::iter([plan.id]), &config)
            .unwrap();
    let unit = route::work_unit_context_from_route(
        &routed_plan.0,
        backends.work_unit_backend(),
        stream::iter([0]),
        &config,
    )
    .unwrap();
    unit.0.resolved().await.unwrap();

    Fixture {
        backends,
        config,
        _plan: routed_plan,
        unit,
    }
}

fn names(unit: &WorkUnit, kind: ResourceKind) -> Vec<String> {
    unit.resources
        .resources(kind)
        .iter()
        .map(|r| r.name().to_string())
        .collect()
}

#[tokio::test]
async fn cancelling_every_add_leaves_nothing_to_commit() {
    let fx = fixture().await;
    let sync = DraftSync::attach(&fx.unit.0, &fx.config).unwrap();

    for _ in 0..3 {
        sync.begin_create(ResourceKind::Software).unwrap();
    }
    assert_eq!(sync.add_count(ResourceKind::Software), 3);
    for _ in 0..3 {
        assert!(sync.cancel_create(ResourceKind::Software).is_some());
    }
    assert!(sync.cancel_create(ResourceKind::Software).is_none());

    assert!(sync.is_clean());
    assert_eq!(sync.compile_patch().unwrap().splice_count(), 0);
}

#[tokio::test]
async fn replace_outside_committed_range_is_refused() {
    let fx = fixture().await;
    let sync = DraftSync::attach(&fx.unit.0, &fx.config).unwrap();

    assert_eq!(
        sync.begin_replace(ResourceKind::EquipmentLease, 2).unwrap_err(),
        DraftError::IndexOutOfRange {
            kind: ResourceKind::EquipmentLease,
            index: 2,
            len: 2,
        }
    );
    assert!(sync.replace_indices(ResourceKind::EquipmentLease).is_empty());

    let first = sync.begin_replace(ResourceKind::EquipmentLease, 1).unwrap();
    let again = sync.begin_replace(ResourceKind::EquipmentLease, 1).unwrap();
    assert_eq!(first, again);
    assert_eq!(sync.replace_indices(ResourceKind::EquipmentLease), vec![1]);
}

#[tokio::test]
async fn invalid_draft_blocks_the_whole_commit() {
    let fx = fixture().await;
    let sync = DraftSync::attach(&fx.unit.0, &fx.config).unwrap();

    let good = sync.begin_create(ResourceKind::EquipmentLease).unwrap();
    sync.set_field(good, "name", json!("cryostat")).unwrap();
    let bad = sync.begin_create(ResourceKind::EquipmentLease).unwrap();
    assert_eq!(
        sync.set_field(bad, "quantity", json!("lots")).unwrap(),
        DraftState::Invalid
    );

    let err = sync.commit_all().await.unwrap_err();
    let entries = err.invalid_entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].slot, DraftSlot::Create(1));
    assert_eq!(fx.backends.work_units.calls("update"), 0);
    assert_eq!(sync.add_count(ResourceKind::EquipmentLease), 2);
}

#[tokio::test]
async fn commit_all_applies_adds_and_replaces_in_one_update() {
    let fx = fixture().await;
    let sync = DraftSync::attach(&fx.unit.0, &fx.config).unwrap();

    let added = sync.begin_create(ResourceKind::EquipmentLease).unwrap();
    sync.set_field(added, "name", json!("cryostat")).unwrap();
    let renamed = sync.begin_replace(ResourceKind::Software, 0).unwrap();
    sync.set_field(renamed, "name", json!("napari")).unwrap();

    let committed = sync.commit_all().await.unwrap();
    assert_eq!(fx.backends.work_units.calls("update"), 1);
    assert_eq!(
        names(&committed, ResourceKind::EquipmentLease),
        ["confocal", "lightsheet", "cryostat"]
    );
    assert_eq!(names(&committed, ResourceKind::Software), ["napari"]);
    assert_eq!(names(&committed, ResourceKind::Service), ["sequencing"]);

    assert!(sync.is_clean());
    assert_eq!(fx.unit.0.entity().unwrap().resources, committed.resources);
}

#[tokio::test]
async fn external_delete_invalidates_replace_draft() {
    let fx = fixture().await;
    let sync = DraftSync::attach(&fx.unit.0, &fx.config).unwrap();
    let kept = sync.begin_replace(ResourceKind::EquipmentLease, 0).unwrap();
    let doomed = sync.begin_replace(ResourceKind::EquipmentLease, 1).unwrap();

    let delete = ResourcePatch::new()
        .with_splice(ResourceKind::EquipmentLease, ResourceSplice::delete(1));
    fx.unit.0.commit(WorkUnitPatch::from(delete)).await.unwrap();

    assert!(
        wait_until(Duration::from_secs(1), || {
            sync.draft(doomed).map(|d| d.is_stale()).unwrap_or(false)
        })
        .await
    );
    assert!(!sync.draft(kept).unwrap().is_stale());

    let err = sync.commit_all().await.unwrap_err();
    assert_eq!(
        err.invalid_entries()[0].issues,
        vec![DraftIssue::Stale { index: 1 }]
    );
}

#[tokio::test]
async fn stale_drafts_kept_when_invalidation_is_off() {
    let fx = fixture().await;
    let config = fx.config.clone().with_invalidate_stale_drafts(false);
    let sync = DraftSync::attach(&fx.unit.0, &config).unwrap();
    let handle = sync.begin_replace(ResourceKind::Software, 0).unwrap();

    let rename = ResourcePatch::new().with_splice(
        ResourceKind::Software,
        ResourceSplice::replace(0, software("ImageJ")),
    );
    fx.unit.0.commit(WorkUnitPatch::from(rename)).await.unwrap();

    assert_eq!(sync.refresh().unwrap(), 0);
    assert!(!sync.draft(handle).unwrap().is_stale());
}

#[tokio::test]
async fn refresh_marks_a_renamed_target_stale() {
    let fx = fixture().await;
    let sync = DraftSync::attach(&fx.unit.0, &fx.config).unwrap();
    let handle = sync.begin_replace(ResourceKind::Software, 0).unwrap();
    assert_eq!(sync.refresh().unwrap(), 0);

    let rename = ResourcePatch::new().with_splice(
        ResourceKind::Software,
        ResourceSplice::replace(0, software("ImageJ")),
    );
    fx.unit.0.commit(WorkUnitPatch::from(rename)).await.unwrap();

    assert!(sync.refresh().unwrap() <= 1);
    assert!(sync.draft(handle).unwrap().is_stale());
    assert_eq!(sync.refresh().unwrap(), 0);
}

#[tokio::test]
async fn dispose_discards_open_drafts() {
    let fx = fixture().await;
    let sync = DraftSync::attach(&fx.unit.0, &fx.config).unwrap();
    sync.begin_create(ResourceKind::Service).unwrap();
    sync.begin_replace(ResourceKind::Service, 0).unwrap();

    let Fixture { unit: (ctx, guard), .. } = fx;
    guard.dispose();

    assert!(sync.is_clean());
    assert_eq!(
        sync.begin_create(ResourceKind::Service).unwrap_err(),
        DraftError::Context(ContextError::Disposed { entity: "work unit" })
    );
    assert!(ctx.is_disposed());
}

#[tokio::test]
async fn one_session_per_context() {
    let fx = fixture().await;
    let _sync = DraftSync::attach(&fx.unit.0, &fx.config).unwrap();
    assert!(matches!(
        DraftSync::attach(&fx.unit.0, &fx.config),
        Err(DraftError::SessionActive { .. })
    ));
}
