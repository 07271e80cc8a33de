//! Experimental plans

use super::funding::FundingModelId;
use crate::entity::{Entity, EntityJson, EntityPatch};
use crate::error::BackendError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Plan identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub Uuid);

impl PlanId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A submitted experimental plan request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    pub title: String,
    pub researcher: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_model_id: Option<FundingModelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// Partial plan record; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub researcher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campus: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_model_id: Option<FundingModelId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl PlanPatch {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_researcher(mut self, researcher: impl Into<String>) -> Self {
        self.researcher = Some(researcher.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_campus(mut self, campus: impl Into<String>) -> Self {
        self.campus = Some(campus.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_funding_model(mut self, id: FundingModelId) -> Self {
        self.funding_model_id = Some(id);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_dates(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }
}

impl Plan {
    /// Build a new plan from a creation patch
    ///
    /// # Errors
    /// Returns `Rejected` if the title is missing or the dates are inverted
    pub fn from_patch(id: PlanId, patch: &PlanPatch) -> Result<Self, BackendError> {
        let title = patch
            .title
            .clone()
            .ok_or_else(|| BackendError::Rejected("plan title is required".into()))?;
        let plan = Self {
            id,
            title,
            researcher: patch.researcher.clone().unwrap_or_default(),
            campus: patch.campus.clone(),
            funding_model_id: patch.funding_model_id,
            start_date: patch.start_date,
            end_date: patch.end_date,
        };
        plan.check_dates()?;
        Ok(plan)
    }

    /// Plan with the patch's fields overlaid
    ///
    /// # Errors
    /// Returns `Rejected` if the result has inverted dates
    pub fn apply(&self, patch: &PlanPatch) -> Result<Self, BackendError> {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title.clone_from(title);
        }
        if let Some(researcher) = &patch.researcher {
            next.researcher.clone_from(researcher);
        }
        if patch.campus.is_some() {
            next.campus.clone_from(&patch.campus);
        }
        if patch.funding_model_id.is_some() {
            next.funding_model_id = patch.funding_model_id;
        }
        if patch.start_date.is_some() {
            next.start_date = patch.start_date;
        }
        if patch.end_date.is_some() {
            next.end_date = patch.end_date;
        }
        next.check_dates()?;
        Ok(next)
    }

    fn check_dates(&self) -> Result<(), BackendError> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if end < start => Err(BackendError::Rejected(format!(
                "plan ends ({end}) before it starts ({start})"
            ))),
            _ => Ok(()),
        }
    }
}

impl Entity for Plan {
    type Id = PlanId;
    const NAME: &'static str = "plan";

    fn id(&self) -> PlanId {
        self.id
    }
}

impl EntityJson for Plan {
    fn from_json(value: &Value) -> Result<Self, BackendError> {
        Ok(serde_json::from_value(value.clone())?)
    }

    fn to_json(&self) -> Result<Value, BackendError> {
        Ok(serde_json::to_value(self)?)
    }
}

impl EntityPatch for PlanPatch {
    fn to_json(&self) -> Result<Value, BackendError> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_json(value: &Value) -> Result<Self, BackendError> {
        Ok(serde_json::from_value(value.clone())?)
    }
}
