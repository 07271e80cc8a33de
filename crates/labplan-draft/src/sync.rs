//! Draft synchronization layer
//!
//! [`DraftSync`] mirrors the committed container of one context for editing.
//! Drafts live in per-kind buckets outside the committed container; the only
//! way they reach it is [`DraftSync::compile_patch`] followed by the owning
//! context's `commit`.
//!
//! # Invariants
//! - at most one `DraftSync` per context at a time (session claim)
//! - replace drafts are keyed by committed index, validated against the
//!   committed container when opened
//! - drafts belong to the container they were opened on; when the context
//!   moves to a different container every bucket is discarded
//! - a handle addresses one draft only; once that draft is cancelled,
//!   committed or discarded the handle resolves to nothing
//! - a successful [`DraftSync::commit_all`] clears every bucket
//! - disposing the context discards every bucket synchronously

use crate::bucket::DraftBucket;
use crate::draft::{DraftState, ResourceDraft};
use crate::error::{DraftError, DraftSlot, InvalidEntry};
use futures::StreamExt;
use labplan_context::{
    ContainerEntity, Context, ContextError, DisposeHook, LabConfig, SessionClaim,
};
use labplan_resource::{
    ContainerId, ResourceContainer, ResourceKind, ResourcePatch, ResourceRegistry,
    ResourceSplice,
};
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use tokio::task::AbortHandle;

/// Address of one open draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DraftHandle {
    pub kind: ResourceKind,
    pub slot: DraftSlot,
    id: u64,
}

/// Container the open drafts were written against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Scope {
    #[default]
    Unbound,
    Bound(Option<ContainerId>),
}

#[derive(Debug, Default)]
struct Drafts {
    buckets: BTreeMap<ResourceKind, DraftBucket>,
    scope: Scope,
    last_id: u64,
    disposed: bool,
}

impl Drafts {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn bucket(&mut self, kind: ResourceKind) -> &mut DraftBucket {
        self.buckets.entry(kind).or_default()
    }

    fn get_mut(&mut self, handle: DraftHandle) -> Option<&mut ResourceDraft> {
        let bucket = self.buckets.get_mut(&handle.kind)?;
        let draft = match handle.slot {
            DraftSlot::Create(position) => bucket.add_mut(position),
            DraftSlot::Replace(index) => bucket.replace_mut(index),
        };
        draft.filter(|draft| draft.id() == handle.id)
    }

    fn clear(&mut self) {
        self.buckets.clear();
    }

    fn is_empty(&self) -> bool {
        self.buckets.values().all(DraftBucket::is_empty)
    }

    fn len(&self) -> usize {
        self.buckets.values().map(DraftBucket::len).sum()
    }
}

/// Bind the drafts to `container`, then optionally re-check replace drafts
///
/// Drafts written against another container are discarded. Returns how
/// many replace drafts were newly marked stale.
fn reconcile(drafts: &mut Drafts, container: &ResourceContainer, invalidate: bool) -> usize {
    let current = container.id();
    if let Scope::Bound(bound) = drafts.scope {
        if bound != current {
            let discarded = drafts.len();
            drafts.clear();
            if discarded > 0 {
                tracing::warn!(?bound, ?current, discarded, "container changed; drafts discarded");
            }
        }
    }
    drafts.scope = Scope::Bound(current);
    if invalidate {
        invalidate_stale(drafts, container)
    } else {
        0
    }
}

/// Mark replace drafts whose committed target moved or changed
fn invalidate_stale(drafts: &mut Drafts, container: &ResourceContainer) -> usize {
    let mut marked = 0;
    for (kind, bucket) in &mut drafts.buckets {
        for (index, draft) in bucket.replace_drafts_mut() {
            if draft.is_stale() {
                continue;
            }
            let unchanged = match (container.resources(*kind).get(index), draft.origin()) {
                (Some(current), Some(origin)) => {
                    current.container_id() == origin.container_id()
                        && current.same_content(origin)
                }
                _ => false,
            };
            if !unchanged {
                draft.mark_stale(index);
                marked += 1;
                tracing::warn!(%kind, index, "replace draft invalidated by external change");
            }
        }
    }
    marked
}

/// Draft buckets bound to one container-backed context
pub struct DraftSync<E: ContainerEntity, P: Send + 'static> {
    context: Context<E, P>,
    registry: Arc<ResourceRegistry>,
    drafts: Arc<Mutex<Drafts>>,
    invalidate: bool,
    watcher: Option<AbortHandle>,
    dispose_hook: DisposeHook,
    _claim: SessionClaim,
}

impl<E: ContainerEntity, P: Send + 'static> std::fmt::Debug for DraftSync<E, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftSync")
            .field("entity", &E::NAME)
            .field("drafts", &*self.drafts.lock())
            .finish_non_exhaustive()
    }
}

impl<E, P> DraftSync<E, P>
where
    E: ContainerEntity,
    P: From<ResourcePatch> + Send + 'static,
{
    /// Start the editing session on `context` with the standard registry
    ///
    /// # Errors
    /// Returns `SessionActive` if another session holds the context
    pub fn attach(context: &Context<E, P>, config: &LabConfig) -> Result<Self, DraftError> {
        Self::with_registry(context, config, Arc::new(ResourceRegistry::with_defaults()))
    }

    /// Start the editing session with a custom registry
    ///
    /// # Errors
    /// Returns `SessionActive` if another session holds the context
    pub fn with_registry(
        context: &Context<E, P>,
        config: &LabConfig,
        registry: Arc<ResourceRegistry>,
    ) -> Result<Self, DraftError> {
        let claim = context.claim_session()?;
        let mut initial = Drafts::default();
        if let Ok(entity) = context.entity() {
            initial.scope = Scope::Bound(entity.resources().id());
        }
        let drafts = Arc::new(Mutex::new(initial));

        let weak = Arc::downgrade(&drafts);
        let dispose_hook = context.on_dispose(move || {
            if let Some(drafts) = weak.upgrade() {
                let mut drafts = drafts.lock();
                drafts.clear();
                drafts.disposed = true;
                tracing::debug!(entity = E::NAME, "drafts discarded with context");
            }
        });

        let invalidate = config.invalidate_stale_drafts;
        let watcher = tokio::runtime::Handle::try_current().ok().map(|runtime| {
            Self::spawn_watcher(&runtime, context, Arc::downgrade(&drafts), invalidate)
        });

        Ok(Self {
            context: context.clone(),
            registry,
            drafts,
            invalidate,
            watcher,
            dispose_hook,
            _claim: claim,
        })
    }

    fn spawn_watcher(
        runtime: &tokio::runtime::Handle,
        context: &Context<E, P>,
        drafts: Weak<Mutex<Drafts>>,
        invalidate: bool,
    ) -> AbortHandle {
        let mut entities = context.entities();
        runtime
            .spawn(async move {
                while let Some(Ok(entity)) = entities.next().await {
                    let Some(live) = drafts.upgrade() else {
                        return;
                    };
                    reconcile(&mut live.lock(), entity.resources(), invalidate);
                }
            })
            .abort_handle()
    }

    /// Owning context
    #[inline]
    #[must_use]
    pub fn context(&self) -> &Context<E, P> {
        &self.context
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    fn lock_open(&self) -> Result<MutexGuard<'_, Drafts>, DraftError> {
        let drafts = self.drafts.lock();
        if drafts.disposed {
            return Err(ContextError::Disposed { entity: E::NAME }.into());
        }
        Ok(drafts)
    }

    /// Open a blank create draft at the end of the kind's add bucket
    ///
    /// # Errors
    /// - `Disposed` after the context was disposed
    /// - `UnknownKind` if the registry has no codec for `kind`
    pub fn begin_create(&self, kind: ResourceKind) -> Result<DraftHandle, DraftError> {
        let entity = self.context.entity().ok();
        let mut drafts = self.lock_open()?;
        if let Some(entity) = &entity {
            reconcile(&mut drafts, entity.resources(), self.invalidate);
        }
        let id = drafts.next_id();
        let draft = ResourceDraft::blank(id, kind, &self.registry)?;
        let position = drafts.bucket(kind).push_add(draft);
        tracing::debug!(%kind, position, "create draft opened");
        Ok(DraftHandle {
            kind,
            slot: DraftSlot::Create(position),
            id,
        })
    }

    /// Drop the most recent create draft of `kind`
    ///
    /// Returns the removed draft, or `None` if the bucket had none.
    pub fn cancel_create(&self, kind: ResourceKind) -> Option<ResourceDraft> {
        let removed = self.drafts.lock().bucket(kind).pop_add();
        if removed.is_some() {
            tracing::debug!(%kind, "create draft cancelled");
        }
        removed
    }

    /// Open a replace draft pre-populated from the committed resource
    ///
    /// Reopening an index that already has a draft returns the same handle.
    ///
    /// # Errors
    /// - `IndexOutOfRange` if `index` is outside the committed collection
    /// - `NotReady`/`NotCreated` if the context holds no entity
    /// - the registry's error if the committed resource cannot be encoded
    pub fn begin_replace(&self, kind: ResourceKind, index: usize) -> Result<DraftHandle, DraftError> {
        let entity = self.context.entity()?;
        let container = entity.resources();
        let resource = container.resource_at(kind, index)?;
        let mut drafts = self.lock_open()?;
        reconcile(&mut drafts, container, self.invalidate);

        let fresh = drafts.next_id();
        let registry = &self.registry;
        let id = drafts
            .bucket(kind)
            .try_open_replace(index, || ResourceDraft::from_resource(fresh, resource, registry))?
            .id();
        tracing::debug!(%kind, index, "replace draft opened");
        Ok(DraftHandle {
            kind,
            slot: DraftSlot::Replace(index),
            id,
        })
    }

    /// Drop the replace draft at `index`; the committed container is untouched
    pub fn discard_replace(&self, kind: ResourceKind, index: usize) -> Option<ResourceDraft> {
        self.drafts.lock().bucket(kind).remove_replace(index)
    }

    /// Set one field of an open draft
    ///
    /// # Errors
    /// Returns `NoSuchDraft` if the handle does not address an open draft
    pub fn set_field(
        &self,
        handle: DraftHandle,
        name: &str,
        value: Value,
    ) -> Result<DraftState, DraftError> {
        let mut drafts = self.lock_open()?;
        let draft = drafts.get_mut(handle).ok_or(DraftError::NoSuchDraft {
            kind: handle.kind,
            slot: handle.slot,
        })?;
        Ok(draft.set_field(name, value, &self.registry))
    }

    /// Snapshot of an open draft
    ///
    /// # Errors
    /// Returns `NoSuchDraft` if the handle does not address an open draft
    pub fn draft(&self, handle: DraftHandle) -> Result<ResourceDraft, DraftError> {
        self.lock_open()?
            .get_mut(handle)
            .cloned()
            .ok_or(DraftError::NoSuchDraft {
                kind: handle.kind,
                slot: handle.slot,
            })
    }

    /// Number of open create drafts for `kind`
    #[must_use]
    pub fn add_count(&self, kind: ResourceKind) -> usize {
        self.drafts
            .lock()
            .buckets
            .get(&kind)
            .map_or(0, |bucket| bucket.add_drafts().len())
    }

    /// Committed indices with an open replace draft
    #[must_use]
    pub fn replace_indices(&self, kind: ResourceKind) -> Vec<usize> {
        self.drafts.lock().buckets.get(&kind).map_or_else(Vec::new, |bucket| {
            bucket.replace_drafts().map(|(index, _)| index).collect()
        })
    }

    /// Whether no draft is open
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.drafts.lock().is_empty()
    }

    /// Re-check open drafts against the committed container
    ///
    /// Drafts opened on a different container are discarded. Returns how
    /// many replace drafts were newly marked stale, always zero when stale
    /// invalidation is turned off.
    ///
    /// # Errors
    /// Returns a context error if no entity is committed
    pub fn refresh(&self) -> Result<usize, DraftError> {
        let entity = self.context.entity()?;
        let mut drafts = self.lock_open()?;
        Ok(reconcile(&mut drafts, entity.resources(), self.invalidate))
    }

    /// Compile every open draft into one patch against the committed container
    ///
    /// Each kind gets one splice appending its create drafts at the end of
    /// the collection and one single-item replace splice per replace draft.
    /// The patch is pinned to the committed container's hash.
    ///
    /// # Errors
    /// - `InvalidDraft` listing every draft that fails validation
    /// - a context error if no entity is committed
    pub fn compile_patch(&self) -> Result<ResourcePatch, DraftError> {
        let entity = self.context.entity()?;
        let container = entity.resources();
        let mut drafts = self.lock_open()?;
        reconcile(&mut drafts, container, self.invalidate);

        let mut patch = ResourcePatch::new().with_base(container.hash()?);
        let mut invalid = Vec::new();
        for (kind, bucket) in &drafts.buckets {
            let kind = *kind;
            let mut added = Vec::new();
            for (position, draft) in bucket.add_drafts().iter().enumerate() {
                match draft.materialize(&self.registry) {
                    Ok(resource) => added.push(resource),
                    Err(issues) => invalid.push(InvalidEntry {
                        kind,
                        slot: DraftSlot::Create(position),
                        issues,
                    }),
                }
            }
            if !added.is_empty() {
                patch.push(kind, ResourceSplice::insert(container.count(kind), added));
            }
            for (index, draft) in bucket.replace_drafts() {
                match draft.materialize(&self.registry) {
                    Ok(resource) => patch.push(kind, ResourceSplice::replace(index, resource)),
                    Err(issues) => invalid.push(InvalidEntry {
                        kind,
                        slot: DraftSlot::Replace(index),
                        issues,
                    }),
                }
            }
        }

        if !invalid.is_empty() {
            tracing::debug!(entity = E::NAME, invalid = invalid.len(), "patch refused");
            return Err(DraftError::InvalidDraft(invalid));
        }
        Ok(patch)
    }

    /// Compile, commit through the context, and clear all drafts on success
    ///
    /// # Errors
    /// - `InvalidDraft` if any draft fails validation; nothing is sent
    /// - the context's commit error; drafts are kept
    pub async fn commit_all(&self) -> Result<E, DraftError> {
        let patch = self.compile_patch()?;
        let splices = patch.splice_count();
        let entity = self.context.commit(P::from(patch)).await?;
        self.drafts.lock().clear();
        tracing::info!(entity = E::NAME, splices, "drafts committed");
        Ok(entity)
    }
}

impl<E: ContainerEntity, P: Send + 'static> Drop for DraftSync<E, P> {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        self.context.remove_dispose_hook(self.dispose_hook);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labplan_resource::{EquipmentLease, Resource};

    fn container(names: &[&str]) -> ResourceContainer {
        ResourceContainer::from_resources(
            None,
            names
                .iter()
                .map(|n| Resource::from(EquipmentLease::new(*n)))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn stale_when_target_deleted_or_changed() {
        let before = container(&["a", "b", "c"]);
        let registry = ResourceRegistry::standard();
        let mut drafts = Drafts::default();
        let bucket = drafts.bucket(ResourceKind::EquipmentLease);
        for (id, index) in [(1, 0), (2, 2)] {
            let origin = &before.resources(ResourceKind::EquipmentLease)[index];
            let opened = bucket
                .try_open_replace(index, || ResourceDraft::from_resource(id, origin, registry))
                .unwrap();
            assert!(!opened.is_stale());
        }

        let after = container(&["a", "b"]);
        assert_eq!(invalidate_stale(&mut drafts, &after), 1);
        let bucket = drafts.bucket(ResourceKind::EquipmentLease);
        assert!(!bucket.replace_mut(0).unwrap().is_stale());
        assert!(bucket.replace_mut(2).unwrap().is_stale());

        assert_eq!(invalidate_stale(&mut drafts, &after), 0);
    }

    #[test]
    fn moving_to_another_container_discards_drafts() {
        let a = ResourceContainer::from_resources(
            Some(ContainerId::new()),
            vec![Resource::from(EquipmentLease::new("a"))],
        );
        let b = a.clone().with_id(Some(ContainerId::new()));
        let registry = ResourceRegistry::standard();

        let mut drafts = Drafts::default();
        assert_eq!(reconcile(&mut drafts, &a, true), 0);
        let id = drafts.next_id();
        let origin = &a.resources(ResourceKind::EquipmentLease)[0];
        drafts
            .bucket(ResourceKind::EquipmentLease)
            .try_open_replace(0, || ResourceDraft::from_resource(id, origin, registry))
            .unwrap();
        assert_eq!(reconcile(&mut drafts, &a, true), 0);
        assert!(!drafts.is_empty());

        reconcile(&mut drafts, &b, true);
        assert!(drafts.is_empty());
        assert_eq!(drafts.scope, Scope::Bound(b.id()));
    }

    #[test]
    fn handle_does_not_resolve_to_a_later_draft_in_its_slot() {
        let registry = ResourceRegistry::standard();
        let mut drafts = Drafts::default();
        let kind = ResourceKind::Software;

        let first = drafts.next_id();
        let position = drafts
            .bucket(kind)
            .push_add(ResourceDraft::blank(first, kind, registry).unwrap());
        let old = DraftHandle {
            kind,
            slot: DraftSlot::Create(position),
            id: first,
        };
        drafts.bucket(kind).pop_add();

        let second = drafts.next_id();
        drafts
            .bucket(kind)
            .push_add(ResourceDraft::blank(second, kind, registry).unwrap());
        assert!(drafts.get_mut(old).is_none());
        assert!(drafts.get_mut(DraftHandle { id: second, ..old }).is_some());
    }
}
