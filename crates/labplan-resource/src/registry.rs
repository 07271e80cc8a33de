//! Resource registry
//!
//! Provides [`ResourceRegistry`], the single place that maps a [`ResourceKind`]
//! to its JSON codec and draft template. Everything that needs per-kind
//! behaviour looks it up here instead of matching on the kind.

use crate::error::ResourceError;
use crate::kind::ResourceKind;
use crate::resource::Resource;
use crate::types::{
    EquipmentLease, InputMaterial, OutputMaterial, ResourceVariant, Service, Software,
};
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Decode an untagged resource body
pub type FromJsonFn = fn(Value) -> Result<Resource, ResourceError>;

/// Encode a resource body without its tag
pub type ToJsonFn = fn(&Resource) -> Result<Value, ResourceError>;

/// Initial field map for a blank draft
pub type DraftFactoryFn = fn() -> Map<String, Value>;

/// Per-kind functions
#[derive(Clone, Copy)]
pub struct ResourceCodec {
    pub kind: ResourceKind,
    pub from_json: FromJsonFn,
    pub to_json: ToJsonFn,
    pub draft_factory: DraftFactoryFn,
}

impl ResourceCodec {
    /// Codec backed by a variant's serde impls
    #[must_use]
    pub fn of<T: ResourceVariant>() -> Self {
        Self {
            kind: T::KIND,
            from_json: decode::<T>,
            to_json: encode::<T>,
            draft_factory: T::draft_template,
        }
    }
}

impl fmt::Debug for ResourceCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceCodec")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

fn decode<T: ResourceVariant>(value: Value) -> Result<Resource, ResourceError> {
    serde_json::from_value::<T>(value)
        .map(T::into_resource)
        .map_err(|e| ResourceError::codec(T::KIND.tag(), e))
}

fn encode<T: ResourceVariant>(resource: &Resource) -> Result<Value, ResourceError> {
    let inner = T::from_resource(resource).ok_or(ResourceError::KindMismatch {
        expected: T::KIND,
        actual: resource.kind(),
    })?;
    serde_json::to_value(inner).map_err(|e| ResourceError::codec(T::KIND.tag(), e))
}

static STANDARD: Lazy<ResourceRegistry> = Lazy::new(ResourceRegistry::with_defaults);

/// Mapping from kind to codec
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    codecs: BTreeMap<ResourceKind, ResourceCodec>,
}

impl ResourceRegistry {
    /// Empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            codecs: BTreeMap::new(),
        }
    }

    /// Registry with a codec for every built-in kind
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ResourceCodec::of::<EquipmentLease>());
        registry.register(ResourceCodec::of::<Software>());
        registry.register(ResourceCodec::of::<Service>());
        registry.register(ResourceCodec::of::<InputMaterial>());
        registry.register(ResourceCodec::of::<OutputMaterial>());
        registry
    }

    /// Shared immutable registry with the defaults
    #[inline]
    #[must_use]
    pub fn standard() -> &'static Self {
        &STANDARD
    }

    /// Register or replace a codec
    pub fn register(&mut self, codec: ResourceCodec) {
        self.codecs.insert(codec.kind, codec);
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.codecs.contains_key(&kind)
    }

    /// Registered kinds in collection order
    pub fn kinds(&self) -> impl Iterator<Item = ResourceKind> + '_ {
        self.codecs.keys().copied()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Look up a codec
    ///
    /// # Errors
    /// Returns `UnknownKind` if the kind was never registered
    pub fn codec(&self, kind: ResourceKind) -> Result<&ResourceCodec, ResourceError> {
        self.codecs
            .get(&kind)
            .ok_or_else(|| ResourceError::UnknownKind(kind.tag().to_string()))
    }

    /// Decode an untagged body of the given kind
    ///
    /// # Errors
    /// Returns error if the kind is unknown or the body does not decode
    pub fn from_json(&self, kind: ResourceKind, value: Value) -> Result<Resource, ResourceError> {
        (self.codec(kind)?.from_json)(value)
    }

    /// Encode a resource body without its tag
    ///
    /// # Errors
    /// Returns error if the kind is unknown or encoding fails
    pub fn to_json(&self, resource: &Resource) -> Result<Value, ResourceError> {
        (self.codec(resource.kind())?.to_json)(resource)
    }

    /// Blank draft fields for a kind
    ///
    /// # Errors
    /// Returns error if the kind is unknown
    pub fn draft_template(&self, kind: ResourceKind) -> Result<Map<String, Value>, ResourceError> {
        Ok((self.codec(kind)?.draft_factory)())
    }
}
