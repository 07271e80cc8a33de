//! Concrete resource variants
//!
//! Each variant is a plain serde struct sharing a flattened [`ResourceMeta`]
//! (position and owning container). [`ResourceVariant`] ties a struct to its
//! [`ResourceKind`] so the registry can build codecs generically.

mod equipment;
mod material;
mod service;
mod software;

pub use equipment::EquipmentLease;
pub use material::{InputMaterial, OutputMaterial};
pub use service::Service;
pub use software::Software;

use crate::kind::ResourceKind;
use crate::resource::Resource;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of the entity that owns a resource container
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(pub Uuid);

impl ContainerId {
    /// Fresh random id
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContainerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ContainerId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Fields every resource carries
///
/// `index` is the resource's position within its kind's collection at the time
/// the container was produced. It is rewritten whenever a patch touches the
/// collection and is not a stable identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMeta {
    #[serde(default)]
    pub index: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<ContainerId>,
}

/// Binds a variant struct to its kind
pub trait ResourceVariant:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    /// Kind tag of this variant
    const KIND: ResourceKind;

    /// Shared fields
    fn meta(&self) -> &ResourceMeta;

    /// Wrap in the tagged union
    fn into_resource(self) -> Resource;

    /// Borrow out of the tagged union if the kind matches
    fn from_resource(resource: &Resource) -> Option<&Self>;

    /// Initial field values for a blank draft of this kind
    ///
    /// Fields left out are required and must be filled in before the draft
    /// validates.
    #[must_use]
    fn draft_template() -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }
}

/// Implements [`ResourceVariant`] for a struct with a `meta` field
macro_rules! resource_variant {
    ($ty:ident, $kind:ident) => {
        impl $crate::types::ResourceVariant for $ty {
            const KIND: $crate::kind::ResourceKind = $crate::kind::ResourceKind::$kind;

            fn meta(&self) -> &$crate::types::ResourceMeta {
                &self.meta
            }

            fn into_resource(self) -> $crate::resource::Resource {
                $crate::resource::Resource::$kind(self)
            }

            fn from_resource(resource: &$crate::resource::Resource) -> Option<&Self> {
                match resource {
                    $crate::resource::Resource::$kind(inner) => Some(inner),
                    _ => None,
                }
            }

            fn draft_template() -> serde_json::Map<String, serde_json::Value> {
                $ty::template()
            }
        }
    };
}

pub(crate) use resource_variant;
