//! Services and tasks

use super::{resource_variant, ResourceMeta};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Work performed for the plan by a facility or contractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(flatten)]
    pub meta: ResourceMeta,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
}

impl Service {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ResourceMeta::default(),
            name: name.into(),
            provider: None,
            description: String::new(),
            estimated_hours: None,
        }
    }

    fn template() -> Map<String, Value> {
        Map::new()
    }
}

resource_variant!(Service, Service);
