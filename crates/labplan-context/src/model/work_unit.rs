//! Work units
//!
//! A work unit belongs to a plan and owns the plan's resource container for
//! that unit of work. Its JSON form flattens the header fields and the
//! container collections into one object:
//!
//! ```json
//! { "id": "…", "planId": "…", "index": 0, "name": "Imaging", "equipments": [ … ], … }
//! ```

use super::plan::{Plan, PlanId, PlanPatch};
use crate::backend::Backend;
use crate::context::{Context, EntityOps};
use crate::entity::{ContainerEntity, Entity, EntityJson, EntityPatch};
use crate::error::{BackendError, ContextError};
use async_trait::async_trait;
use labplan_resource::{ContainerId, ResourceContainer, ResourceError, ResourcePatch, ResourceRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkUnitId(pub Uuid);

impl WorkUnitId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Id of the resource container this unit owns
    #[inline]
    #[must_use]
    pub fn container_id(self) -> ContainerId {
        ContainerId::from(self.0)
    }
}

impl Default for WorkUnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorkUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Header {
    id: WorkUnitId,
    plan_id: PlanId,
    #[serde(default)]
    index: usize,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeaderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    plan_id: Option<PlanId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

/// One unit of work within a plan, with its resources
#[derive(Debug, Clone, PartialEq)]
pub struct WorkUnit {
    pub id: WorkUnitId,
    pub plan_id: PlanId,
    pub index: usize,
    pub name: String,
    pub description: String,
    pub resources: ResourceContainer,
}

/// Header field updates plus resource splices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkUnitPatch {
    pub plan_id: Option<PlanId>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub resources: ResourcePatch,
}

impl WorkUnitPatch {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_resources(mut self, resources: ResourcePatch) -> Self {
        self.resources = resources;
        self
    }
}

impl From<ResourcePatch> for WorkUnitPatch {
    fn from(resources: ResourcePatch) -> Self {
        Self {
            resources,
            ..Self::default()
        }
    }
}

fn rejected(err: ResourceError) -> BackendError {
    match err {
        ResourceError::Codec { context, message } => {
            BackendError::Codec(format!("{context}: {message}"))
        }
        other => BackendError::Rejected(other.to_string()),
    }
}

impl WorkUnit {
    /// Build a new work unit at position `index` of its plan
    ///
    /// # Errors
    /// Returns `Rejected` if the patch has no plan id or its splices do not
    /// apply to an empty container
    pub fn from_patch(id: WorkUnitId, index: usize, patch: &WorkUnitPatch) -> Result<Self, BackendError> {
        let plan_id = patch
            .plan_id
            .ok_or_else(|| BackendError::Rejected("work unit needs a plan id".into()))?;
        let resources = ResourceContainer::new(Some(id.container_id()))
            .apply_patch(&patch.resources)
            .map_err(rejected)?;
        Ok(Self {
            id,
            plan_id,
            index,
            name: patch.name.clone().unwrap_or_default(),
            description: patch.description.clone().unwrap_or_default(),
            resources,
        })
    }

    /// Work unit with the patch applied
    ///
    /// # Errors
    /// Returns `Rejected` if the resource splices do not apply
    pub fn apply(&self, patch: &WorkUnitPatch) -> Result<Self, BackendError> {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name.clone_from(name);
        }
        if let Some(description) = &patch.description {
            next.description.clone_from(description);
        }
        next.resources = self.resources.apply_patch(&patch.resources).map_err(rejected)?;
        Ok(next)
    }
}

impl Entity for WorkUnit {
    type Id = WorkUnitId;
    const NAME: &'static str = "work unit";

    fn id(&self) -> WorkUnitId {
        self.id
    }
}

impl ContainerEntity for WorkUnit {
    fn resources(&self) -> &ResourceContainer {
        &self.resources
    }
}

fn merge(mut into: Map<String, Value>, from: Value) -> Map<String, Value> {
    if let Value::Object(fields) = from {
        into.extend(fields);
    }
    into
}

impl EntityJson for WorkUnit {
    fn from_json(value: &Value) -> Result<Self, BackendError> {
        let header: Header = serde_json::from_value(value.clone())?;
        let resources = ResourceContainer::from_json(value, ResourceRegistry::standard())
            .map_err(rejected)?
            .with_id(Some(header.id.container_id()));
        Ok(Self {
            id: header.id,
            plan_id: header.plan_id,
            index: header.index,
            name: header.name,
            description: header.description,
            resources,
        })
    }

    fn to_json(&self) -> Result<Value, BackendError> {
        let container = self
            .resources
            .to_json(ResourceRegistry::standard())
            .map_err(rejected)?;
        let header = serde_json::to_value(Header {
            id: self.id,
            plan_id: self.plan_id,
            index: self.index,
            name: self.name.clone(),
            description: self.description.clone(),
        })?;
        Ok(Value::Object(merge(merge(Map::new(), container), header)))
    }
}

impl EntityPatch for WorkUnitPatch {
    fn to_json(&self) -> Result<Value, BackendError> {
        let resources = self
            .resources
            .to_json(ResourceRegistry::standard())
            .map_err(rejected)?;
        let header = serde_json::to_value(HeaderPatch {
            plan_id: self.plan_id,
            name: self.name.clone(),
            description: self.description.clone(),
        })?;
        Ok(Value::Object(merge(merge(Map::new(), resources), header)))
    }

    fn from_json(value: &Value) -> Result<Self, BackendError> {
        let header: HeaderPatch = serde_json::from_value(value.clone())?;
        let resources =
            ResourcePatch::from_json(value, ResourceRegistry::standard()).map_err(rejected)?;
        Ok(Self {
            plan_id: header.plan_id,
            name: header.name,
            description: header.description,
            resources,
        })
    }
}

/// Work-unit create/update that merges the owning plan's id on create
pub struct WorkUnitOps {
    backend: Arc<dyn Backend<WorkUnit>>,
    plan: Context<Plan, PlanPatch>,
}

impl WorkUnitOps {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend<WorkUnit>>, plan: Context<Plan, PlanPatch>) -> Self {
        Self { backend, plan }
    }
}

#[async_trait]
impl EntityOps<WorkUnit, WorkUnitPatch> for WorkUnitOps {
    async fn create(&self, mut patch: WorkUnitPatch) -> Result<WorkUnit, ContextError> {
        let plan = self.plan.entity()?;
        patch.plan_id = Some(plan.id);
        tracing::debug!(plan = %plan.id, "creating work unit under plan");
        Ok(self.backend.create(patch.to_json()?).await?)
    }

    async fn update(&self, id: &WorkUnitId, patch: WorkUnitPatch) -> Result<WorkUnit, ContextError> {
        Ok(self.backend.update(id, patch.to_json()?).await?)
    }
}
