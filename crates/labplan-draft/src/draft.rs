//! Draft forms
//!
//! A [`ResourceDraft`] holds the raw field values of a new or edited resource.
//! Validity is recomputed through the registry codec on every field change,
//! so a draft is valid exactly when its fields decode as its kind.
//!
//! ```text
//! Empty ──set_field──► Editing ──revalidate──► Valid | Invalid
//!                         ▲                        │
//!                         └────────set_field───────┘
//! ```

use labplan_resource::{Resource, ResourceError, ResourceKind, ResourceRegistry};
use serde_json::{Map, Value};

/// Keys owned by the container, never edited through a draft
const META_KEYS: [&str; 2] = ["index", "containerId"];

/// Draft lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftState {
    /// Blank form, no field touched yet
    Empty,
    /// Fields changed, validity not yet recomputed
    Editing,
    /// Fields decode as a resource of the draft's kind
    Valid,
    /// Fields do not decode, or the draft went stale
    Invalid,
}

/// Why a draft is invalid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DraftIssue {
    /// Fields rejected by the kind's codec
    Field(String),
    /// The committed resource this draft replaces moved or changed
    Stale { index: usize },
}

/// In-progress edit of one resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDraft {
    id: u64,
    kind: ResourceKind,
    fields: Map<String, Value>,
    state: DraftState,
    issues: Vec<DraftIssue>,
    value: Option<Resource>,
    origin: Option<Resource>,
}

impl ResourceDraft {
    /// Blank draft seeded from the kind's template
    ///
    /// # Errors
    /// Returns `UnknownKind` if the registry has no codec for `kind`
    pub(crate) fn blank(
        id: u64,
        kind: ResourceKind,
        registry: &ResourceRegistry,
    ) -> Result<Self, ResourceError> {
        Ok(Self {
            id,
            kind,
            fields: registry.draft_template(kind)?,
            state: DraftState::Empty,
            issues: Vec::new(),
            value: None,
            origin: None,
        })
    }

    /// Draft pre-populated from a committed resource
    ///
    /// # Errors
    /// Returns the codec's error if the resource cannot be encoded as an object
    pub(crate) fn from_resource(
        id: u64,
        resource: &Resource,
        registry: &ResourceRegistry,
    ) -> Result<Self, ResourceError> {
        let mut fields = match registry.to_json(resource)? {
            Value::Object(fields) => fields,
            other => {
                return Err(ResourceError::codec(
                    resource.kind().tag(),
                    format!("expected a JSON object, got {other}"),
                ))
            }
        };
        for key in META_KEYS {
            fields.remove(key);
        }
        let mut draft = Self {
            id,
            kind: resource.kind(),
            fields,
            state: DraftState::Editing,
            issues: Vec::new(),
            value: None,
            origin: Some(resource.clone()),
        };
        draft.revalidate(registry);
        Ok(draft)
    }

    /// Session-unique identity, never reused after the draft is dropped
    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> DraftState {
        self.state
    }

    #[inline]
    #[must_use]
    pub fn issues(&self) -> &[DraftIssue] {
        &self.issues
    }

    #[inline]
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Committed resource a replace draft was opened on
    #[inline]
    #[must_use]
    pub fn origin(&self) -> Option<&Resource> {
        self.origin.as_ref()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.state == DraftState::Valid
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| matches!(issue, DraftIssue::Stale { .. }))
    }

    /// Set one field and recompute validity
    pub fn set_field(
        &mut self,
        name: impl Into<String>,
        value: Value,
        registry: &ResourceRegistry,
    ) -> DraftState {
        let name = name.into();
        if META_KEYS.contains(&name.as_str()) {
            return self.state;
        }
        self.fields.insert(name, value);
        self.state = DraftState::Editing;
        self.revalidate(registry)
    }

    /// Remove one field and recompute validity
    pub fn clear_field(&mut self, name: &str, registry: &ResourceRegistry) -> DraftState {
        self.fields.remove(name);
        self.state = DraftState::Editing;
        self.revalidate(registry)
    }

    /// Recompute validity from the current fields
    pub fn revalidate(&mut self, registry: &ResourceRegistry) -> DraftState {
        let stale: Vec<DraftIssue> = self
            .issues
            .drain(..)
            .filter(|issue| matches!(issue, DraftIssue::Stale { .. }))
            .collect();
        self.issues = stale;

        match registry.from_json(self.kind, Value::Object(self.fields.clone())) {
            Ok(resource) => self.value = Some(resource),
            Err(err) => {
                self.value = None;
                self.issues.push(DraftIssue::Field(err.to_string()));
            }
        }
        self.state = if self.issues.is_empty() {
            DraftState::Valid
        } else {
            DraftState::Invalid
        };
        self.state
    }

    /// Mark invalid because the committed target moved under it
    pub(crate) fn mark_stale(&mut self, index: usize) {
        if !self.is_stale() {
            self.issues.push(DraftIssue::Stale { index });
        }
        self.state = DraftState::Invalid;
    }

    /// Resource this draft would commit
    ///
    /// # Errors
    /// Returns the draft's issues if it is not valid. An untouched blank
    /// draft reports the codec's complaint about its missing fields.
    pub fn materialize(&self, registry: &ResourceRegistry) -> Result<Resource, Vec<DraftIssue>> {
        match (self.state, &self.value) {
            (DraftState::Valid, Some(resource)) => Ok(resource.clone()),
            (DraftState::Invalid, _) => Err(self.issues.clone()),
            _ => {
                let mut trial = self.clone();
                trial.revalidate(registry);
                match trial.value {
                    Some(resource) if trial.issues.is_empty() => Ok(resource),
                    _ => Err(trial.issues),
                }
            }
        }
    }
}
