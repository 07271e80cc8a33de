//! Testing utilities for the lab plan workspace
//!
//! In-memory backend, fixtures and a spy stream for teardown assertions.

#![allow(missing_docs)]

use async_trait::async_trait;
use dashmap::DashMap;
use futures::Stream;
use labplan_context::{
    Backend, BackendError, EntityJson, EntityPatch, FundingModel, FundingModelId,
    FundingModelPatch, Plan, PlanId, PlanPatch, WorkUnit, WorkUnitId, WorkUnitPatch,
};
use labplan_resource::{
    EquipmentLease, Resource, ResourceKind, ResourcePatch, ResourceSplice, Service, Software,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

/// Entity the in-memory backend knows how to create and patch
pub trait Stored: EntityJson {
    type Patch: EntityPatch;

    fn create_from(patch: &Self::Patch, existing: &[Self]) -> Result<Self, BackendError>;

    fn apply_patch(&self, patch: &Self::Patch) -> Result<Self, BackendError>;
}

impl Stored for Plan {
    type Patch = PlanPatch;

    fn create_from(patch: &PlanPatch, _existing: &[Self]) -> Result<Self, BackendError> {
        Plan::from_patch(PlanId::new(), patch)
    }

    fn apply_patch(&self, patch: &PlanPatch) -> Result<Self, BackendError> {
        self.apply(patch)
    }
}

impl Stored for WorkUnit {
    type Patch = WorkUnitPatch;

    fn create_from(patch: &WorkUnitPatch, existing: &[Self]) -> Result<Self, BackendError> {
        let index = existing
            .iter()
            .filter(|unit| Some(unit.plan_id) == patch.plan_id)
            .count();
        WorkUnit::from_patch(WorkUnitId::new(), index, patch)
    }

    fn apply_patch(&self, patch: &WorkUnitPatch) -> Result<Self, BackendError> {
        self.apply(patch)
    }
}

impl Stored for FundingModel {
    type Patch = FundingModelPatch;

    fn create_from(patch: &FundingModelPatch, _existing: &[Self]) -> Result<Self, BackendError> {
        FundingModel::from_patch(FundingModelId::new(), patch)
    }

    fn apply_patch(&self, patch: &FundingModelPatch) -> Result<Self, BackendError> {
        Ok(self.apply(patch))
    }
}

/// Backend holding entities in a map
pub struct InMemoryBackend<E: Stored> {
    entities: DashMap<String, (u64, E)>,
    seq: AtomicU64,
    calls: DashMap<&'static str, usize>,
    latency: Mutex<Option<Duration>>,
    fail_next: Mutex<Option<BackendError>>,
}

impl<E: Stored> Default for InMemoryBackend<E> {
    fn default() -> Self {
        Self {
            entities: DashMap::new(),
            seq: AtomicU64::new(0),
            calls: DashMap::new(),
            latency: Mutex::new(None),
            fail_next: Mutex::new(None),
        }
    }
}

impl<E: Stored> InMemoryBackend<E> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store directly, bypassing `create`
    pub fn insert(&self, entity: E) -> E {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.entities
            .insert(entity.id().to_string(), (seq, entity.clone()));
        entity
    }

    pub fn get(&self, id: &E::Id) -> Option<E> {
        self.entities.get(&id.to_string()).map(|entry| entry.1.clone())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// How many times `op` ("fetch", "create", "update", "query") was called
    pub fn calls(&self, op: &'static str) -> usize {
        self.calls.get(op).map_or(0, |count| *count)
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    /// Fail the next call with `err`
    pub fn fail_next(&self, err: BackendError) {
        *self.fail_next.lock() = Some(err);
    }

    fn ordered(&self) -> Vec<E> {
        let mut all: Vec<(u64, E)> = self
            .entities
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|(seq, _)| *seq);
        all.into_iter().map(|(_, entity)| entity).collect()
    }

    async fn enter(&self, op: &'static str) -> Result<(), BackendError> {
        *self.calls.entry(op).or_insert(0) += 1;
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.fail_next.lock().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn matches_filter(json: &Value, filter: &Value) -> bool {
    match filter.as_object() {
        Some(fields) => fields.iter().all(|(key, want)| json.get(key) == Some(want)),
        None => true,
    }
}

#[async_trait]
impl<E: Stored> Backend<E> for InMemoryBackend<E> {
    async fn fetch(&self, id: &E::Id) -> Result<E, BackendError> {
        self.enter("fetch").await?;
        self.get(id).ok_or_else(|| BackendError::not_found(E::NAME, id))
    }

    async fn create(&self, patch: Value) -> Result<E, BackendError> {
        self.enter("create").await?;
        let patch = E::Patch::from_json(&patch)?;
        let entity = E::create_from(&patch, &self.ordered())?;
        Ok(self.insert(entity))
    }

    async fn update(&self, id: &E::Id, patch: Value) -> Result<E, BackendError> {
        self.enter("update").await?;
        let patch = E::Patch::from_json(&patch)?;
        let key = id.to_string();
        let mut entry = self
            .entities
            .get_mut(&key)
            .ok_or_else(|| BackendError::not_found(E::NAME, id))?;
        let next = entry.1.apply_patch(&patch)?;
        entry.1 = next.clone();
        Ok(next)
    }

    async fn query(&self, filter: Value) -> Result<Vec<E>, BackendError> {
        self.enter("query").await?;
        let mut out = Vec::new();
        for entity in self.ordered() {
            if matches_filter(&entity.to_json()?, &filter) {
                out.push(entity);
            }
        }
        Ok(out)
    }
}

/// Teardown counter shared with a [`SpyStream`]
#[derive(Debug, Clone, Default)]
pub struct Spy {
    polls: Arc<AtomicUsize>,
    teardowns: Arc<AtomicUsize>,
}

impl Spy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `inner` so its polls and drop are counted
    pub fn wrap<S: Stream + Unpin>(&self, inner: S) -> SpyStream<S> {
        SpyStream {
            inner,
            spy: self.clone(),
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn teardowns(&self) -> usize {
        self.teardowns.load(Ordering::SeqCst)
    }
}

/// Stream wrapper that reports to a [`Spy`]
pub struct SpyStream<S> {
    inner: S,
    spy: Spy,
}

impl<S: Stream + Unpin> Stream for SpyStream<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<S::Item>> {
        self.spy.polls.fetch_add(1, Ordering::SeqCst);
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl<S> Drop for SpyStream<S> {
    fn drop(&mut self) {
        self.spy.teardowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

pub fn lease(name: &str) -> Resource {
    EquipmentLease::new(name).into()
}

pub fn software(name: &str) -> Resource {
    Software::new(name).into()
}

pub fn service(name: &str) -> Resource {
    Service::new(name).into()
}

/// Patch appending `items` to an empty container
pub fn seed_patch(items: Vec<Resource>) -> ResourcePatch {
    let mut patch = ResourcePatch::new();
    for kind in ResourceKind::ALL {
        let of_kind: Vec<Resource> = items.iter().filter(|r| r.kind() == kind).cloned().collect();
        if !of_kind.is_empty() {
            patch.push(kind, ResourceSplice::insert(0, of_kind));
        }
    }
    patch
}

/// In-memory backends for every entity type
pub struct LabBackends {
    pub plans: Arc<InMemoryBackend<Plan>>,
    pub work_units: Arc<InMemoryBackend<WorkUnit>>,
    pub funding_models: Arc<InMemoryBackend<FundingModel>>,
}

impl Default for LabBackends {
    fn default() -> Self {
        Self::new()
    }
}

impl LabBackends {
    pub fn new() -> Self {
        Self {
            plans: InMemoryBackend::new(),
            work_units: InMemoryBackend::new(),
            funding_models: InMemoryBackend::new(),
        }
    }

    pub fn plan_backend(&self) -> Arc<dyn Backend<Plan>> {
        self.plans.clone()
    }

    pub fn work_unit_backend(&self) -> Arc<dyn Backend<WorkUnit>> {
        self.work_units.clone()
    }

    pub fn funding_backend(&self) -> Arc<dyn Backend<FundingModel>> {
        self.funding_models.clone()
    }

    pub fn seed_plan(&self, title: &str) -> Plan {
        let plan = Plan::from_patch(PlanId::new(), &PlanPatch::new().with_title(title)).unwrap();
        self.plans.insert(plan)
    }

    pub fn seed_work_unit(&self, plan: &Plan, name: &str, resources: Vec<Resource>) -> WorkUnit {
        let patch = WorkUnitPatch {
            plan_id: Some(plan.id),
            ..WorkUnitPatch::new().with_name(name)
        }
        .with_resources(seed_patch(resources));
        let unit = WorkUnit::create_from(&patch, &self.work_units.ordered()).unwrap();
        self.work_units.insert(unit)
    }

    pub fn seed_funding_model(&self, name: &str) -> FundingModel {
        let model =
            FundingModel::from_patch(FundingModelId::new(), &FundingModelPatch::named(name))
                .unwrap();
        self.funding_models.insert(model)
    }
}
