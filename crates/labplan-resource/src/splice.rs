//! Splice primitives
//!
//! A [`ResourceSplice`] removes the half-open range `[start, end)` of a
//! collection and inserts `items` at `start`. A list of splices is always
//! interpreted against the offsets of the collection *before* any of them is
//! applied, so they must not overlap.
//!
//! # Invariants
//! - `end` defaults to `start` (a pure insertion)
//! - `start <= end <= len` for the collection being patched
//! - no two splices in a list share a start or intersect

use crate::error::ResourceError;
use crate::kind::ResourceKind;
use serde::{Deserialize, Serialize};

/// Range-replace over an ordered collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSplice<T> {
    pub start: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<usize>,

    #[serde(default)]
    pub items: Vec<T>,
}

impl<T> ResourceSplice<T> {
    /// Insert `items` before `start`
    #[inline]
    #[must_use]
    pub fn insert(start: usize, items: Vec<T>) -> Self {
        Self {
            start,
            end: None,
            items,
        }
    }

    /// Replace the single element at `index`
    #[inline]
    #[must_use]
    pub fn replace(index: usize, item: T) -> Self {
        Self {
            start: index,
            end: Some(index + 1),
            items: vec![item],
        }
    }

    /// Remove the single element at `index`
    #[inline]
    #[must_use]
    pub fn delete(index: usize) -> Self {
        Self::delete_range(index, index + 1)
    }

    /// Remove `[start, end)`
    #[inline]
    #[must_use]
    pub fn delete_range(start: usize, end: usize) -> Self {
        Self {
            start,
            end: Some(end),
            items: Vec::new(),
        }
    }

    /// Effective end of the removed range
    #[inline]
    #[must_use]
    pub fn end(&self) -> usize {
        self.end.unwrap_or(self.start)
    }

    /// Removed range as a pair
    #[inline]
    #[must_use]
    pub fn range(&self) -> (usize, usize) {
        (self.start, self.end())
    }

    /// True when the splice removes nothing and inserts nothing
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.start == self.end() && self.items.is_empty()
    }

    /// Net change in collection length
    #[must_use]
    pub fn len_delta(&self) -> isize {
        let removed = self.end().saturating_sub(self.start);
        self.items.len() as isize - removed as isize
    }

    /// Transform the items, keeping the range
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<ResourceSplice<U>, E> {
        Ok(ResourceSplice {
            start: self.start,
            end: self.end,
            items: self.items.into_iter().map(f).collect::<Result<_, _>>()?,
        })
    }
}

/// Reject splice lists whose ranges intersect or share a start
///
/// Runs before any bounds check so that an overlapping list is reported as
/// such even when one of its ranges is also out of bounds.
///
/// # Errors
/// Returns `InvertedSplice` or `OverlappingSplices`
pub fn check_disjoint<T>(kind: ResourceKind, splices: &[ResourceSplice<T>]) -> Result<(), ResourceError> {
    let mut ranges = Vec::with_capacity(splices.len());
    for splice in splices {
        let (start, end) = splice.range();
        if end < start {
            return Err(ResourceError::InvertedSplice { kind, start, end });
        }
        ranges.push((start, end));
    }
    ranges.sort_unstable();

    for pair in ranges.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        if second.0 < first.1 || second.0 == first.0 {
            return Err(ResourceError::OverlappingSplices {
                kind,
                first,
                second,
            });
        }
    }
    Ok(())
}

/// Reject splices reaching past a collection of length `len`
///
/// # Errors
/// Returns `SpliceOutOfBounds` for the first offending splice
pub fn check_bounds<T>(
    kind: ResourceKind,
    splices: &[ResourceSplice<T>],
    len: usize,
) -> Result<(), ResourceError> {
    match splices.iter().find(|s| s.end() > len) {
        Some(s) => Err(ResourceError::SpliceOutOfBounds {
            kind,
            start: s.start,
            end: s.end(),
            len,
        }),
        None => Ok(()),
    }
}

/// Apply checked splices to a collection in place
///
/// Splices are applied from the highest start down, so each one still sees
/// the original offsets below it.
///
/// # Errors
/// Returns error if the splices overlap or run out of bounds; `items` is left
/// untouched in that case.
pub fn apply_splices<T: Clone>(
    kind: ResourceKind,
    items: &mut Vec<T>,
    splices: &[ResourceSplice<T>],
) -> Result<(), ResourceError> {
    check_disjoint(kind, splices)?;
    check_bounds(kind, splices, items.len())?;

    let mut ordered: Vec<&ResourceSplice<T>> = splices.iter().collect();
    ordered.sort_by(|a, b| b.start.cmp(&a.start));

    for splice in ordered {
        items.splice(splice.start..splice.end(), splice.items.iter().cloned());
    }
    Ok(())
}
