//! Resource kind tags
//!
//! [`ResourceKind`] is the closed set of resource variants a work unit can own.
//! Each kind has two spellings: a singular tag (`equipment-lease`) used inside
//! tagged resource JSON, and a collection key (`equipments`) used for the
//! per-kind arrays of containers and patches.

use crate::error::ResourceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Leased lab equipment
    #[serde(rename = "equipments")]
    EquipmentLease,

    /// Software licences and installs
    #[serde(rename = "softwares")]
    Software,

    /// Services and tasks performed by another party
    #[serde(rename = "services")]
    Service,

    /// Materials consumed by the work unit
    #[serde(rename = "inputMaterials")]
    InputMaterial,

    /// Materials produced by the work unit
    #[serde(rename = "outputMaterials")]
    OutputMaterial,
}

impl ResourceKind {
    /// Every kind, in collection order
    pub const ALL: [ResourceKind; 5] = [
        Self::EquipmentLease,
        Self::Software,
        Self::Service,
        Self::InputMaterial,
        Self::OutputMaterial,
    ];

    /// Singular type tag
    #[inline]
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::EquipmentLease => "equipment-lease",
            Self::Software => "software",
            Self::Service => "service",
            Self::InputMaterial => "input-material",
            Self::OutputMaterial => "output-material",
        }
    }

    /// Key of this kind's array in container and patch JSON
    #[inline]
    #[must_use]
    pub const fn collection_key(self) -> &'static str {
        match self {
            Self::EquipmentLease => "equipments",
            Self::Software => "softwares",
            Self::Service => "services",
            Self::InputMaterial => "inputMaterials",
            Self::OutputMaterial => "outputMaterials",
        }
    }

    /// Look a kind up by its collection key
    #[must_use]
    pub fn from_collection_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.collection_key() == key)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Accepts either the tag or the collection key
impl FromStr for ResourceKind {
    type Err = ResourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.tag() == s || k.collection_key() == s)
            .ok_or_else(|| ResourceError::UnknownKind(s.to_string()))
    }
}
