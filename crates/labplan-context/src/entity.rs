//! Entity and patch traits
//!
//! An entity has a stable identifier once committed. Before that it exists
//! only as a patch.

use crate::error::BackendError;
use serde_json::Value;
use std::fmt::{Debug, Display};

/// A committed domain object
pub trait Entity: Clone + Debug + Send + Sync + 'static {
    /// Stable identifier assigned by the backend
    type Id: Clone + Debug + Display + PartialEq + Send + Sync + 'static;

    /// Short name used in errors and logs
    const NAME: &'static str;

    /// Identifier of this entity
    fn id(&self) -> Self::Id;
}

/// Change description for an entity, with its JSON wire form
pub trait EntityPatch: Clone + Debug + Send + Sync + 'static + Sized {
    /// Encode for the backend
    ///
    /// # Errors
    /// Returns `BackendError::Codec` if the patch cannot be encoded
    fn to_json(&self) -> Result<Value, BackendError>;

    /// Decode a patch received as JSON
    ///
    /// # Errors
    /// Returns `BackendError::Codec` if the value is not a valid patch
    fn from_json(value: &Value) -> Result<Self, BackendError>;
}

/// Entity whose JSON form the backend returns
pub trait EntityJson: Entity + Sized {
    /// Decode a backend response
    ///
    /// # Errors
    /// Returns `BackendError::Codec` if the value is not a valid entity
    fn from_json(value: &Value) -> Result<Self, BackendError>;

    /// Encode for storage
    ///
    /// # Errors
    /// Returns `BackendError::Codec` if the entity cannot be encoded
    fn to_json(&self) -> Result<Value, BackendError>;
}

/// Entity that owns a resource container
pub trait ContainerEntity: Entity {
    /// Committed resource collections
    fn resources(&self) -> &labplan_resource::ResourceContainer;
}
