//! Offline patch tooling
//!
//! File-level operations behind the `labplan` binary: apply a resource patch
//! to a container, check a patch without applying it, and print a
//! container's content hash for pinning patches.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

use anyhow::{Context, Result};
use labplan_resource::{ContentHash, ResourceContainer, ResourceKind, ResourcePatch, ResourceRegistry};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install the global subscriber; `RUST_LOG` wins over `default_filter`
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Decode a container file
///
/// # Errors
/// Fails if the file cannot be read or does not decode as a container
pub fn load_container(path: &Path) -> Result<ResourceContainer> {
    let json = read_json(path)?;
    ResourceContainer::from_json(&json, ResourceRegistry::standard())
        .with_context(|| format!("decoding container {}", path.display()))
}

/// Decode a patch file
///
/// # Errors
/// Fails if the file cannot be read or does not decode as a patch
pub fn load_patch(path: &Path) -> Result<ResourcePatch> {
    let json = read_json(path)?;
    ResourcePatch::from_json(&json, ResourceRegistry::standard())
        .with_context(|| format!("decoding patch {}", path.display()))
}

/// Apply the patch at `patch` to the container at `container`
///
/// Returns the resulting container as JSON.
///
/// # Errors
/// Fails on I/O or decoding errors, or if the patch does not apply
pub fn apply(container: &Path, patch: &Path) -> Result<Value> {
    let registry = ResourceRegistry::standard();
    let current = load_container(container)?;
    let patch = load_patch(patch)?;
    let next = current
        .apply_patch(&patch)
        .context("patch does not apply to container")?;
    tracing::info!(
        splices = patch.splice_count(),
        before = current.total(),
        after = next.total(),
        "patch applied"
    );
    Ok(next.to_json(registry)?)
}

/// Splice counts per kind of a checked patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSummary {
    pub base: Option<ContentHash>,
    pub splices: Vec<(ResourceKind, usize)>,
}

impl fmt::Display for PatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.base {
            Some(base) => writeln!(f, "base: {base}")?,
            None => writeln!(f, "base: none")?,
        }
        if self.splices.is_empty() {
            return writeln!(f, "no splices");
        }
        for (kind, count) in &self.splices {
            writeln!(f, "{kind}: {count} splice(s)")?;
        }
        Ok(())
    }
}

/// Decode the patch at `patch` and reject overlapping or inverted splices
///
/// # Errors
/// Fails on I/O or decoding errors, or if the splices are malformed
pub fn check(patch: &Path) -> Result<PatchSummary> {
    let patch = load_patch(patch)?;
    patch.validate().context("patch is malformed")?;
    Ok(PatchSummary {
        base: patch.base(),
        splices: patch
            .iter()
            .filter(|(_, splices)| !splices.is_empty())
            .map(|(kind, splices)| (kind, splices.len()))
            .collect(),
    })
}

/// Content hash of the container at `container`
///
/// # Errors
/// Fails on I/O or decoding errors
pub fn hash(container: &Path) -> Result<ContentHash> {
    Ok(load_container(container)?.hash()?)
}
