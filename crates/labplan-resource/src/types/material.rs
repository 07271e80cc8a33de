//! Input and output materials
//!
//! Both kinds share the quantity fields; they differ in what happens at either
//! end of the work unit (storage for inputs, disposal for outputs).

use super::{resource_variant, ResourceMeta};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

fn material_template() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("hazardClasses".into(), json!([]));
    map
}

/// Material consumed by a work unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputMaterial {
    #[serde(flatten)]
    pub meta: ResourceMeta,

    pub name: String,

    /// Unit of measure, e.g. `g` or `mL`
    pub base_unit: String,

    pub num_units: f64,

    #[serde(default)]
    pub hazard_classes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
}

impl InputMaterial {
    #[must_use]
    pub fn new(name: impl Into<String>, base_unit: impl Into<String>, num_units: f64) -> Self {
        Self {
            meta: ResourceMeta::default(),
            name: name.into(),
            base_unit: base_unit.into(),
            num_units,
            hazard_classes: Vec::new(),
            storage: None,
        }
    }

    fn template() -> Map<String, Value> {
        material_template()
    }
}

resource_variant!(InputMaterial, InputMaterial);

/// Material produced by a work unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputMaterial {
    #[serde(flatten)]
    pub meta: ResourceMeta,

    pub name: String,

    pub base_unit: String,

    pub num_units: f64,

    #[serde(default)]
    pub hazard_classes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disposal: Option<String>,
}

impl OutputMaterial {
    #[must_use]
    pub fn new(name: impl Into<String>, base_unit: impl Into<String>, num_units: f64) -> Self {
        Self {
            meta: ResourceMeta::default(),
            name: name.into(),
            base_unit: base_unit.into(),
            num_units,
            hazard_classes: Vec::new(),
            disposal: None,
        }
    }

    fn template() -> Map<String, Value> {
        material_template()
    }
}

resource_variant!(OutputMaterial, OutputMaterial);
