//! Funding models

use crate::entity::{Entity, EntityJson, EntityPatch};
use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FundingModelId(pub Uuid);

impl FundingModelId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FundingModelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FundingModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How a plan is paid for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingModel {
    pub id: FundingModelId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub requires_membership: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingModelPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_membership: Option<bool>,
}

impl FundingModelPatch {
    #[inline]
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

impl FundingModel {
    /// # Errors
    /// Returns `Rejected` if the name is missing
    pub fn from_patch(id: FundingModelId, patch: &FundingModelPatch) -> Result<Self, BackendError> {
        let name = patch
            .name
            .clone()
            .ok_or_else(|| BackendError::Rejected("funding model name is required".into()))?;
        Ok(Self {
            id,
            name,
            description: patch.description.clone().unwrap_or_default(),
            requires_membership: patch.requires_membership.unwrap_or(false),
        })
    }

    #[must_use]
    pub fn apply(&self, patch: &FundingModelPatch) -> Self {
        let mut next = self.clone();
        if let Some(name) = &patch.name {
            next.name.clone_from(name);
        }
        if let Some(description) = &patch.description {
            next.description.clone_from(description);
        }
        if let Some(flag) = patch.requires_membership {
            next.requires_membership = flag;
        }
        next
    }
}

impl Entity for FundingModel {
    type Id = FundingModelId;
    const NAME: &'static str = "funding model";

    fn id(&self) -> FundingModelId {
        self.id
    }
}

impl EntityJson for FundingModel {
    fn from_json(value: &Value) -> Result<Self, BackendError> {
        Ok(serde_json::from_value(value.clone())?)
    }

    fn to_json(&self) -> Result<Value, BackendError> {
        Ok(serde_json::to_value(self)?)
    }
}

impl EntityPatch for FundingModelPatch {
    fn to_json(&self) -> Result<Value, BackendError> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_json(value: &Value) -> Result<Self, BackendError> {
        Ok(serde_json::from_value(value.clone())?)
    }
}
