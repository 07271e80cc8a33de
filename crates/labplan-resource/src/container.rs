//! Resource containers
//!
//! [`ResourceContainer`] owns one dense, ordered collection per resource kind.
//! It is immutable once built: [`ResourceContainer::apply_patch`] produces a
//! new container and leaves the receiver untouched.

use crate::error::ResourceError;
use crate::hash::ContentHash;
use crate::kind::ResourceKind;
use crate::patch::ResourcePatch;
use crate::registry::ResourceRegistry;
use crate::resource::Resource;
use crate::splice::{apply_splices, check_bounds};
use crate::types::ContainerId;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const ID_KEY: &str = "id";

/// All resource collections for one owning entity
///
/// # Invariants
/// - every kind maps to a dense collection (possibly empty)
/// - every resource's `index` equals its position and its `container_id`
///   equals the container's id
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceContainer {
    id: Option<ContainerId>,
    collections: BTreeMap<ResourceKind, Vec<Resource>>,
}

impl ResourceContainer {
    /// Empty container
    #[must_use]
    pub fn new(id: Option<ContainerId>) -> Self {
        Self {
            id,
            collections: ResourceKind::ALL.into_iter().map(|k| (k, Vec::new())).collect(),
        }
    }

    /// Build from resources in order, grouping by kind
    #[must_use]
    pub fn from_resources(id: Option<ContainerId>, resources: impl IntoIterator<Item = Resource>) -> Self {
        let mut container = Self::new(id);
        for resource in resources {
            container
                .collections
                .entry(resource.kind())
                .or_default()
                .push(resource);
        }
        container.restamp_all();
        container
    }

    /// Owning entity id
    #[inline]
    #[must_use]
    pub fn id(&self) -> Option<ContainerId> {
        self.id
    }

    /// Same resources under a different owner
    #[must_use]
    pub fn with_id(mut self, id: Option<ContainerId>) -> Self {
        self.id = id;
        self.restamp_all();
        self
    }

    /// Resources of one kind, in order
    #[must_use]
    pub fn resources(&self, kind: ResourceKind) -> &[Resource] {
        self.collections.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Resource at a position
    ///
    /// # Errors
    /// Returns `IndexOutOfRange` if `index` is not in `[0, count)`
    pub fn resource_at(&self, kind: ResourceKind, index: usize) -> Result<&Resource, ResourceError> {
        let items = self.resources(kind);
        items.get(index).ok_or(ResourceError::IndexOutOfRange {
            kind,
            index,
            len: items.len(),
        })
    }

    /// Number of resources of one kind
    #[inline]
    #[must_use]
    pub fn count(&self, kind: ResourceKind) -> usize {
        self.resources(kind).len()
    }

    /// Number of resources across all kinds
    #[must_use]
    pub fn total(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    /// Content hash over the tagged resources
    ///
    /// # Errors
    /// Returns error if a resource cannot be serialized
    pub fn hash(&self) -> Result<ContentHash, ResourceError> {
        Ok(ContentHash::compute_serializable(&(self.id, &self.collections))?)
    }

    /// Produce the container that results from applying `patch`
    ///
    /// Every splice list is checked (kind, overlap, bounds) before any
    /// collection is touched. Collections the patch names are renumbered.
    ///
    /// # Errors
    /// - `BaseMismatch` if the patch is pinned to a different container
    /// - `OverlappingSplices`, `InvertedSplice`, `KindMismatch` from validation
    /// - `SpliceOutOfBounds` if a range reaches past its collection
    pub fn apply_patch(&self, patch: &ResourcePatch) -> Result<Self, ResourceError> {
        if let Some(expected) = patch.base() {
            let actual = self.hash()?;
            if expected != actual {
                return Err(ResourceError::BaseMismatch { expected, actual });
            }
        }

        patch.validate()?;
        for (kind, splices) in patch.iter() {
            check_bounds(kind, splices, self.count(kind))?;
        }

        let mut next = self.clone();
        for (kind, splices) in patch.iter() {
            let items = next.collections.entry(kind).or_default();
            apply_splices(kind, items, splices)?;
            let id = next.id;
            for (index, resource) in items.iter_mut().enumerate() {
                resource.restamp(index, id);
            }
            tracing::trace!(%kind, splices = splices.len(), len = items.len(), "applied splices");
        }

        tracing::debug!(
            container = ?self.id,
            splices = patch.splice_count(),
            "patch applied"
        );
        Ok(next)
    }

    /// Encode with one array per collection key
    ///
    /// # Errors
    /// Returns error if a resource cannot be encoded
    pub fn to_json(&self, registry: &ResourceRegistry) -> Result<Value, ResourceError> {
        let mut out = Map::new();
        if let Some(id) = self.id {
            out.insert(ID_KEY.to_string(), Value::String(id.to_string()));
        }
        for kind in ResourceKind::ALL {
            let items = self
                .resources(kind)
                .iter()
                .map(|r| registry.to_json(r))
                .collect::<Result<Vec<_>, _>>()?;
            out.insert(kind.collection_key().to_string(), Value::Array(items));
        }
        Ok(Value::Object(out))
    }

    /// Decode from one array per collection key
    ///
    /// Missing collections decode as empty. Stored `index` and `containerId`
    /// values are discarded in favour of position and the decoded id.
    ///
    /// # Errors
    /// Returns error if the value is not an object or a resource does not decode
    pub fn from_json(value: &Value, registry: &ResourceRegistry) -> Result<Self, ResourceError> {
        let object = value
            .as_object()
            .ok_or_else(|| ResourceError::codec("resource container", "expected a JSON object"))?;

        let id = match object.get(ID_KEY) {
            Some(raw) if !raw.is_null() => Some(
                serde_json::from_value::<ContainerId>(raw.clone())
                    .map_err(|e| ResourceError::codec(ID_KEY, e))?,
            ),
            _ => None,
        };

        let mut container = Self::new(id);
        for kind in ResourceKind::ALL {
            let Some(raw) = object.get(kind.collection_key()) else {
                continue;
            };
            let array = raw.as_array().ok_or_else(|| {
                ResourceError::codec(kind.collection_key(), "expected a JSON array")
            })?;
            let items = array
                .iter()
                .map(|item| registry.from_json(kind, item.clone()))
                .collect::<Result<Vec<_>, _>>()?;
            container.collections.insert(kind, items);
        }
        container.restamp_all();
        Ok(container)
    }

    fn restamp_all(&mut self) {
        let id = self.id;
        for items in self.collections.values_mut() {
            for (index, resource) in items.iter_mut().enumerate() {
                resource.restamp(index, id);
            }
        }
    }
}

/// Free-function form of [`ResourceContainer::apply_patch`]
///
/// # Errors
/// See [`ResourceContainer::apply_patch`]
#[inline]
pub fn apply_patch(
    container: &ResourceContainer,
    patch: &ResourcePatch,
) -> Result<ResourceContainer, ResourceError> {
    container.apply_patch(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splice::ResourceSplice;
    use crate::types::{EquipmentLease, InputMaterial, Software};
    use pretty_assertions::assert_eq;

    fn lease(name: &str) -> Resource {
        EquipmentLease::new(name).into()
    }

    fn names(container: &ResourceContainer, kind: ResourceKind) -> Vec<String> {
        container
            .resources(kind)
            .iter()
            .map(|r| r.name().to_string())
            .collect()
    }

    fn two_leases() -> ResourceContainer {
        ResourceContainer::from_resources(Some(ContainerId::new()), vec![lease("L1"), lease("L2")])
    }

    #[test]
    fn new_container_has_every_collection() {
        let container = ResourceContainer::new(None);
        for kind in ResourceKind::ALL {
            assert_eq!(container.count(kind), 0);
        }
        assert_eq!(container.total(), 0);
    }

    #[test]
    fn from_resources_groups_and_numbers() {
        let id = ContainerId::new();
        let container = ResourceContainer::from_resources(
            Some(id),
            vec![
                lease("L1"),
                Software::new("R").into(),
                lease("L2"),
            ],
        );
        assert_eq!(container.count(ResourceKind::EquipmentLease), 2);
        assert_eq!(container.count(ResourceKind::Software), 1);

        let second = container.resource_at(ResourceKind::EquipmentLease, 1).unwrap();
        assert_eq!(second.index(), 1);
        assert_eq!(second.container_id(), Some(id));
    }

    #[test]
    fn resource_at_out_of_range() {
        let err = two_leases()
            .resource_at(ResourceKind::EquipmentLease, 2)
            .unwrap_err();
        assert_eq!(
            err,
            ResourceError::IndexOutOfRange {
                kind: ResourceKind::EquipmentLease,
                index: 2,
                len: 2
            }
        );
    }

    #[test]
    fn append_is_deterministic() {
        let container = two_leases();
        let patch = ResourcePatch::new().with_splice(
            ResourceKind::EquipmentLease,
            ResourceSplice::insert(2, vec![lease("L3")]),
        );
        let next = container.apply_patch(&patch).unwrap();
        assert_eq!(names(&next, ResourceKind::EquipmentLease), vec!["L1", "L2", "L3"]);
        assert_eq!(next.resource_at(ResourceKind::EquipmentLease, 2).unwrap().container_id(), container.id());
        // input untouched
        assert_eq!(container.count(ResourceKind::EquipmentLease), 2);
    }

    #[test]
    fn delete_renumbers() {
        let container = two_leases();
        let patch = ResourcePatch::new().with_splice(
            ResourceKind::EquipmentLease,
            ResourceSplice::delete_range(0, 1),
        );
        let next = container.apply_patch(&patch).unwrap();
        assert_eq!(names(&next, ResourceKind::EquipmentLease), vec!["L2"]);
        assert_eq!(next.resource_at(ResourceKind::EquipmentLease, 0).unwrap().index(), 0);
    }

    #[test]
    fn overlapping_patch_applies_nothing() {
        let container = two_leases();
        let patch = ResourcePatch::new()
            .with_splice(ResourceKind::EquipmentLease, ResourceSplice::delete_range(0, 2))
            .with_splice(ResourceKind::EquipmentLease, ResourceSplice::delete_range(1, 3));
        let err = container.apply_patch(&patch).unwrap_err();
        assert!(matches!(err, ResourceError::OverlappingSplices { .. }));
    }

    #[test]
    fn bounds_checked_before_any_kind_changes() {
        let container = two_leases();
        let patch = ResourcePatch::new()
            .with_splice(
                ResourceKind::EquipmentLease,
                ResourceSplice::insert(0, vec![lease("L0")]),
            )
            .with_splice(ResourceKind::Software, ResourceSplice::delete(0));
        assert!(matches!(
            container.apply_patch(&patch),
            Err(ResourceError::SpliceOutOfBounds { .. })
        ));
    }

    #[test]
    fn absent_kinds_are_copied() {
        let container = ResourceContainer::from_resources(
            None,
            vec![lease("L1"), InputMaterial::new("agar", "g", 20.0).into()],
        );
        let patch = ResourcePatch::new().with_splice(
            ResourceKind::EquipmentLease,
            ResourceSplice::delete(0),
        );
        let next = container.apply_patch(&patch).unwrap();
        assert_eq!(
            next.resources(ResourceKind::InputMaterial),
            container.resources(ResourceKind::InputMaterial)
        );
    }

    #[test]
    fn base_mismatch_is_refused() {
        let container = two_leases();
        let patch = ResourcePatch::new()
            .with_splice(ResourceKind::EquipmentLease, ResourceSplice::delete(0))
            .with_base(ContentHash::compute(b"other"));
        assert!(matches!(
            container.apply_patch(&patch),
            Err(ResourceError::BaseMismatch { .. })
        ));

        let pinned = ResourcePatch::new()
            .with_splice(ResourceKind::EquipmentLease, ResourceSplice::delete(0))
            .with_base(container.hash().unwrap());
        assert!(container.apply_patch(&pinned).is_ok());
    }

    #[test]
    fn json_round_trip() {
        let container = two_leases();
        let json = container.to_json(ResourceRegistry::standard()).unwrap();
        assert_eq!(json["equipments"].as_array().unwrap().len(), 2);
        assert_eq!(json["softwares"], serde_json::json!([]));

        let back = ResourceContainer::from_json(&json, ResourceRegistry::standard()).unwrap();
        assert_eq!(back, container);
        assert_eq!(back.hash().unwrap(), container.hash().unwrap());
    }
}
