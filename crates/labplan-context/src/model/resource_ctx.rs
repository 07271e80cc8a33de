//! Single resources as entities
//!
//! A resource is addressed by its owning container, its kind and its
//! position. Committing a resource is a single replace splice on the owning
//! work unit, pinned to the container it was read from.

use super::work_unit::{WorkUnit, WorkUnitPatch};
use crate::context::{Context, EntityOps};
use crate::entity::Entity;
use crate::error::ContextError;
use crate::source::{child_of, EntityStream};
use async_trait::async_trait;
use futures::future::{ready, FutureExt};
use futures::Stream;
use labplan_resource::{
    ContainerId, Resource, ResourceError, ResourceKind, ResourcePatch, ResourceSplice,
};
use std::fmt;

/// Position of a resource at one point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub container: Option<ContainerId>,
    pub kind: ResourceKind,
    pub index: usize,
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.container {
            Some(container) => write!(f, "{container}/{}/{}", self.kind, self.index),
            None => write!(f, "-/{}/{}", self.kind, self.index),
        }
    }
}

impl Entity for Resource {
    type Id = ResourceKey;
    const NAME: &'static str = "resource";

    fn id(&self) -> ResourceKey {
        ResourceKey {
            container: self.container_id(),
            kind: self.kind(),
            index: self.index(),
        }
    }
}

/// Resource create/update through the owning work unit's context
pub struct ResourceOps {
    work_unit: Context<WorkUnit, WorkUnitPatch>,
}

impl ResourceOps {
    #[must_use]
    pub fn new(work_unit: Context<WorkUnit, WorkUnitPatch>) -> Self {
        Self { work_unit }
    }
}

#[async_trait]
impl EntityOps<Resource, Resource> for ResourceOps {
    async fn create(&self, resource: Resource) -> Result<Resource, ContextError> {
        let unit = self.work_unit.entity()?;
        let kind = resource.kind();
        let at = unit.resources.count(kind);
        let patch = ResourcePatch::new()
            .with_splice(kind, ResourceSplice::insert(at, vec![resource]))
            .with_base(unit.resources.hash()?);

        let unit = self.work_unit.commit(WorkUnitPatch::from(patch)).await?;
        Ok(unit.resources.resource_at(kind, at)?.clone())
    }

    async fn update(&self, key: &ResourceKey, resource: Resource) -> Result<Resource, ContextError> {
        if resource.kind() != key.kind {
            return Err(ResourceError::KindMismatch {
                expected: key.kind,
                actual: resource.kind(),
            }
            .into());
        }
        let unit = self.work_unit.entity()?;
        unit.resources.resource_at(key.kind, key.index)?;
        let patch = ResourcePatch::new()
            .with_splice(key.kind, ResourceSplice::replace(key.index, resource))
            .with_base(unit.resources.hash()?);

        let unit = self.work_unit.commit(WorkUnitPatch::from(patch)).await?;
        Ok(unit.resources.resource_at(key.kind, key.index)?.clone())
    }
}

/// Source for a resource context addressed by `(kind, index)` within `work_unit`
pub fn resource_source(
    work_unit: &Context<WorkUnit, WorkUnitPatch>,
    addresses: impl Stream<Item = (ResourceKind, usize)> + Send + 'static,
) -> EntityStream<Resource> {
    child_of(work_unit, addresses, |unit: std::sync::Arc<WorkUnit>, (kind, index)| {
        ready(
            unit.resources
                .resource_at(kind, index)
                .cloned()
                .map_err(ContextError::from),
        )
        .boxed()
    })
}
