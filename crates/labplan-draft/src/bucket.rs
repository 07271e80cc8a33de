//! Per-kind draft buckets

use crate::draft::ResourceDraft;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Add drafts in creation order plus replace drafts keyed by committed index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftBucket {
    add: Vec<ResourceDraft>,
    replace: BTreeMap<usize, ResourceDraft>,
}

impl DraftBucket {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an add draft, returning its position
    pub fn push_add(&mut self, draft: ResourceDraft) -> usize {
        self.add.push(draft);
        self.add.len() - 1
    }

    /// Remove the most recent add draft
    pub fn pop_add(&mut self) -> Option<ResourceDraft> {
        self.add.pop()
    }

    /// Open a replace draft unless one is already open at `index`
    ///
    /// # Errors
    /// Returns whatever `make` fails with; the bucket is left unchanged.
    pub fn try_open_replace<E>(
        &mut self,
        index: usize,
        make: impl FnOnce() -> Result<ResourceDraft, E>,
    ) -> Result<&mut ResourceDraft, E> {
        match self.replace.entry(index) {
            Entry::Occupied(open) => Ok(open.into_mut()),
            Entry::Vacant(slot) => Ok(slot.insert(make()?)),
        }
    }

    pub fn remove_replace(&mut self, index: usize) -> Option<ResourceDraft> {
        self.replace.remove(&index)
    }

    #[must_use]
    pub fn add_drafts(&self) -> &[ResourceDraft] {
        &self.add
    }

    pub fn add_mut(&mut self, position: usize) -> Option<&mut ResourceDraft> {
        self.add.get_mut(position)
    }

    pub fn replace_drafts(&self) -> impl Iterator<Item = (usize, &ResourceDraft)> {
        self.replace.iter().map(|(i, d)| (*i, d))
    }

    pub fn replace_drafts_mut(&mut self) -> impl Iterator<Item = (usize, &mut ResourceDraft)> {
        self.replace.iter_mut().map(|(i, d)| (*i, d))
    }

    pub fn replace_mut(&mut self, index: usize) -> Option<&mut ResourceDraft> {
        self.replace.get_mut(&index)
    }

    #[must_use]
    pub fn is_replacing(&self, index: usize) -> bool {
        self.replace.contains_key(&index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.add.len() + self.replace.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.replace.is_empty()
    }

    pub fn clear(&mut self) {
        self.add.clear();
        self.replace.clear();
    }
}
