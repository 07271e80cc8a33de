//! Resource patches
//!
//! A [`ResourcePatch`] maps each resource kind to the list of splices to apply
//! to that kind's collection. Kinds absent from the patch are left alone.
//!
//! Wire form:
//!
//! ```json
//! {
//!   "equipments": [{ "start": 2, "items": [{ "name": "centrifuge", "quantity": 1 }] }],
//!   "softwares":  [{ "start": 0, "end": 1, "items": [] }],
//!   "baseHash": "9f2c..."
//! }
//! ```

use crate::error::ResourceError;
use crate::hash::ContentHash;
use crate::kind::ResourceKind;
use crate::registry::ResourceRegistry;
use crate::resource::Resource;
use crate::splice::{check_disjoint, ResourceSplice};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const BASE_HASH_KEY: &str = "baseHash";

/// Splices per resource kind, optionally pinned to a base container
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePatch {
    splices: BTreeMap<ResourceKind, Vec<ResourceSplice<Resource>>>,
    base: Option<ContentHash>,
}

impl ResourcePatch {
    /// Empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the patch to the container it was computed against
    #[inline]
    #[must_use]
    pub fn with_base(mut self, base: ContentHash) -> Self {
        self.base = Some(base);
        self
    }

    /// Add a splice, builder style
    #[inline]
    #[must_use]
    pub fn with_splice(mut self, kind: ResourceKind, splice: ResourceSplice<Resource>) -> Self {
        self.push(kind, splice);
        self
    }

    /// Add a splice
    pub fn push(&mut self, kind: ResourceKind, splice: ResourceSplice<Resource>) {
        self.splices.entry(kind).or_default().push(splice);
    }

    /// Base container hash, if pinned
    #[inline]
    #[must_use]
    pub fn base(&self) -> Option<ContentHash> {
        self.base
    }

    /// Splices for one kind
    #[must_use]
    pub fn splices(&self, kind: ResourceKind) -> &[ResourceSplice<Resource>] {
        self.splices.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// Kinds with at least one splice entry
    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.splices.keys().copied()
    }

    /// Iterate kinds with their splices
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, &[ResourceSplice<Resource>])> {
        self.splices.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// True when applying the patch cannot change any collection
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.splices.values().flatten().all(ResourceSplice::is_noop)
    }

    /// Total splice count across kinds
    #[must_use]
    pub fn splice_count(&self) -> usize {
        self.splices.values().map(Vec::len).sum()
    }

    /// Structural checks that do not need the target container
    ///
    /// # Errors
    /// Returns the first `KindMismatch`, `InvertedSplice` or `OverlappingSplices`
    pub fn validate(&self) -> Result<(), ResourceError> {
        for (kind, splices) in &self.splices {
            check_disjoint(*kind, splices)?;
            for item in splices.iter().flat_map(|s| &s.items) {
                if item.kind() != *kind {
                    return Err(ResourceError::KindMismatch {
                        expected: *kind,
                        actual: item.kind(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Encode to the wire form
    ///
    /// # Errors
    /// Returns error if an item cannot be encoded
    pub fn to_json(&self, registry: &ResourceRegistry) -> Result<Value, ResourceError> {
        let mut out = Map::new();
        for (kind, splices) in &self.splices {
            let encoded = splices
                .iter()
                .map(|s| {
                    s.clone()
                        .try_map(|item| registry.to_json(&item))
                        .and_then(|s| {
                            serde_json::to_value(s)
                                .map_err(|e| ResourceError::codec(kind.collection_key(), e))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            out.insert(kind.collection_key().to_string(), Value::Array(encoded));
        }
        if let Some(base) = self.base {
            out.insert(BASE_HASH_KEY.to_string(), Value::String(base.to_string()));
        }
        Ok(Value::Object(out))
    }

    /// Decode from the wire form
    ///
    /// Keys that are neither a collection key nor `baseHash` are ignored so
    /// that a patch can share an object with plain entity fields.
    ///
    /// # Errors
    /// Returns error if the value is not an object or an item does not decode
    pub fn from_json(value: &Value, registry: &ResourceRegistry) -> Result<Self, ResourceError> {
        let object = value
            .as_object()
            .ok_or_else(|| ResourceError::codec("resource patch", "expected a JSON object"))?;

        let mut patch = Self::new();
        for (key, entry) in object {
            if key == BASE_HASH_KEY {
                let hash = entry
                    .as_str()
                    .ok_or_else(|| ResourceError::codec(BASE_HASH_KEY, "expected a hex string"))?
                    .parse::<ContentHash>()?;
                patch.base = Some(hash);
                continue;
            }
            let Some(kind) = ResourceKind::from_collection_key(key) else {
                continue;
            };
            let raw: Vec<ResourceSplice<Value>> = serde_json::from_value(entry.clone())
                .map_err(|e| ResourceError::codec(kind.collection_key(), e))?;
            for splice in raw {
                patch.push(kind, splice.try_map(|item| registry.from_json(kind, item))?);
            }
        }
        Ok(patch)
    }
}
