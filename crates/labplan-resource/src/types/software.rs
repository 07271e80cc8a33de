//! Software requirements

use super::{resource_variant, ResourceMeta};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Software a work unit depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Software {
    #[serde(flatten)]
    pub meta: ResourceMeta,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Acceptable versions, empty for any
    #[serde(default)]
    pub versions: Vec<String>,

    #[serde(default)]
    pub licence_required: bool,
}

impl Software {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: ResourceMeta::default(),
            name: name.into(),
            description: String::new(),
            versions: Vec::new(),
            licence_required: false,
        }
    }

    fn template() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("versions".into(), json!([]));
        map.insert("licenceRequired".into(), json!(false));
        map
    }
}

resource_variant!(Software, Software);
