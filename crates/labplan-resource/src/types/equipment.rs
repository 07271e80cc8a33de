//! Equipment leases

use super::{resource_variant, ResourceMeta};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Lab equipment booked for the duration of a work unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquipmentLease {
    #[serde(flatten)]
    pub meta: ResourceMeta,

    /// Equipment name as listed in the facility catalogue
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Number of units leased
    pub quantity: u32,

    /// Lease length, if known up front
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_days: Option<u32>,
}

impl EquipmentLease {
    /// Minimal lease of one unit
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ResourceMeta::default(),
            name: name.into(),
            description: String::new(),
            quantity: 1,
            duration_days: None,
        }
    }

    /// Set quantity
    #[inline]
    #[must_use]
    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    fn template() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("description".into(), json!(""));
        map.insert("quantity".into(), json!(1));
        map
    }
}

resource_variant!(EquipmentLease, EquipmentLease);
