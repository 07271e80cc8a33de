//! The tagged resource union

use crate::kind::ResourceKind;
use crate::types::{
    ContainerId, EquipmentLease, InputMaterial, OutputMaterial, ResourceMeta, Service, Software,
};
use serde::{Deserialize, Serialize};

/// One resource of any kind
///
/// The self-describing JSON form carries a `type` tag (`equipment-lease`, ...).
/// Container and patch JSON omit the tag because the enclosing collection key
/// already names the kind; that form goes through the registry instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Resource {
    EquipmentLease(EquipmentLease),
    Software(Software),
    Service(Service),
    InputMaterial(InputMaterial),
    OutputMaterial(OutputMaterial),
}

impl Resource {
    /// Kind tag
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::EquipmentLease(_) => ResourceKind::EquipmentLease,
            Self::Software(_) => ResourceKind::Software,
            Self::Service(_) => ResourceKind::Service,
            Self::InputMaterial(_) => ResourceKind::InputMaterial,
            Self::OutputMaterial(_) => ResourceKind::OutputMaterial,
        }
    }

    /// Shared fields
    #[must_use]
    pub fn meta(&self) -> &ResourceMeta {
        match self {
            Self::EquipmentLease(r) => &r.meta,
            Self::Software(r) => &r.meta,
            Self::Service(r) => &r.meta,
            Self::InputMaterial(r) => &r.meta,
            Self::OutputMaterial(r) => &r.meta,
        }
    }

    pub(crate) fn meta_mut(&mut self) -> &mut ResourceMeta {
        match self {
            Self::EquipmentLease(r) => &mut r.meta,
            Self::Software(r) => &mut r.meta,
            Self::Service(r) => &mut r.meta,
            Self::InputMaterial(r) => &mut r.meta,
            Self::OutputMaterial(r) => &mut r.meta,
        }
    }

    /// Position within its collection
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.meta().index
    }

    /// Owning container, `None` before first commit
    #[inline]
    #[must_use]
    pub fn container_id(&self) -> Option<ContainerId> {
        self.meta().container_id
    }

    /// Display name shared by every variant
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::EquipmentLease(r) => &r.name,
            Self::Software(r) => &r.name,
            Self::Service(r) => &r.name,
            Self::InputMaterial(r) => &r.name,
            Self::OutputMaterial(r) => &r.name,
        }
    }

    /// Equality ignoring position and owner
    ///
    /// Used to tell whether the resource at an index is still the one a draft
    /// was opened on after the collection has been renumbered.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        *a.meta_mut() = ResourceMeta::default();
        *b.meta_mut() = ResourceMeta::default();
        a == b
    }

    pub(crate) fn restamp(&mut self, index: usize, container_id: Option<ContainerId>) {
        let meta = self.meta_mut();
        meta.index = index;
        meta.container_id = container_id;
    }
}

impl From<EquipmentLease> for Resource {
    fn from(r: EquipmentLease) -> Self {
        Self::EquipmentLease(r)
    }
}

impl From<Software> for Resource {
    fn from(r: Software) -> Self {
        Self::Software(r)
    }
}

impl From<Service> for Resource {
    fn from(r: Service) -> Self {
        Self::Service(r)
    }
}

impl From<InputMaterial> for Resource {
    fn from(r: InputMaterial) -> Self {
        Self::InputMaterial(r)
    }
}

impl From<OutputMaterial> for Resource {
    fn from(r: OutputMaterial) -> Self {
        Self::OutputMaterial(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tagged_json_round_trip() {
        let lease: Resource = EquipmentLease::new("centrifuge").with_quantity(2).into();
        let json = serde_json::to_value(&lease).unwrap();
        assert_eq!(json["type"], "equipment-lease");
        assert_eq!(json["quantity"], 2);

        let back: Resource = serde_json::from_value(json).unwrap();
        assert_eq!(back, lease);
    }

    #[test]
    fn tagged_json_reads_meta() {
        let json = json!({
            "type": "software",
            "name": "matlab",
            "index": 2
        });
        let resource: Resource = serde_json::from_value(json).unwrap();
        assert_eq!(resource.kind(), ResourceKind::Software);
        assert_eq!(resource.index(), 2);
        assert_eq!(resource.container_id(), None);
    }

    #[test]
    fn same_content_ignores_position() {
        let mut a: Resource = Service::new("sequencing").into();
        let b = a.clone();
        a.restamp(7, Some(ContainerId::new()));
        assert!(a.same_content(&b));
        assert_ne!(a, b);
    }
}
