//! Generic entity context
//!
//! A [`Context`] owns one committed-value cell for an entity, the stream that
//! republishes it, and at most one upstream source that decides what the
//! committed value is. Creation and update are delegated to an injected
//! [`EntityOps`]; the same context type serves plans, work units, funding
//! models and individual resources.
//!
//! # Lifecycle
//!
//! ```text
//! new ──► init_create_context ──► create ──► commit*
//!   │                                  ▲
//!   └──► send_committed(source) ───────┘ (swap any number of times)
//!
//! SourceGuard::dispose ──► stream completes, drafts cleared
//! ```
//!
//! # Ordering
//!
//! Every publish bumps a version under the cell lock. A source swap bumps the
//! generation first so the previous source can no longer publish, and its
//! stream is dropped before `send_committed` returns. A successful
//! `create`/`commit` publishes before it returns.

use crate::backend::{Backend, BackendOps};
use crate::config::LabConfig;
use crate::entity::{Entity, EntityPatch};
use crate::error::{BackendError, ContextError};
use crate::source::EntityStream;
use async_trait::async_trait;
use futures::future::{poll_fn, BoxFuture};
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::Poll;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;

/// Create/update collaborator injected into a [`Context`]
#[async_trait]
pub trait EntityOps<E: Entity, P>: Send + Sync {
    /// Create the entity; any parent key is merged here, not by the caller
    async fn create(&self, patch: P) -> Result<E, ContextError>;

    /// Update the entity with this id
    async fn update(&self, id: &E::Id, patch: P) -> Result<E, ContextError>;
}

type CreateFn<E, P> = dyn Fn(P) -> BoxFuture<'static, Result<E, ContextError>> + Send + Sync;
type UpdateFn<E, P> =
    dyn Fn(<E as Entity>::Id, P) -> BoxFuture<'static, Result<E, ContextError>> + Send + Sync;

/// [`EntityOps`] from a pair of closures
pub struct FnOps<E: Entity, P> {
    create: Box<CreateFn<E, P>>,
    update: Box<UpdateFn<E, P>>,
}

impl<E: Entity, P> FnOps<E, P> {
    /// Build from create and update closures
    pub fn new<C, U>(create: C, update: U) -> Self
    where
        C: Fn(P) -> BoxFuture<'static, Result<E, ContextError>> + Send + Sync + 'static,
        U: Fn(E::Id, P) -> BoxFuture<'static, Result<E, ContextError>> + Send + Sync + 'static,
    {
        Self {
            create: Box::new(create),
            update: Box::new(update),
        }
    }
}

#[async_trait]
impl<E: Entity, P: Send + 'static> EntityOps<E, P> for FnOps<E, P> {
    async fn create(&self, patch: P) -> Result<E, ContextError> {
        (self.create)(patch).await
    }

    async fn update(&self, id: &E::Id, patch: P) -> Result<E, ContextError> {
        (self.update)(id.clone(), patch).await
    }
}

/// Committed state of a context
#[derive(Debug, Clone)]
pub enum Committed<E> {
    /// A source is attached (or none yet) and has not produced a value
    Pending,
    /// Pre-creation: the entity does not exist yet
    Absent,
    /// Server-confirmed value
    Ready(Arc<E>),
    /// The source failed; terminal until the source is swapped
    Failed(ContextError),
}

impl<E> Committed<E> {
    /// Committed entity, if any
    #[inline]
    #[must_use]
    pub fn entity(&self) -> Option<&Arc<E>> {
        match self {
            Self::Ready(entity) => Some(entity),
            _ => None,
        }
    }

    /// Whether a value has resolved
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Whether the source has settled (ready, absent or failed)
    #[inline]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Committed state stamped with a monotonically increasing version
#[derive(Debug, Clone)]
pub struct Snapshot<E> {
    pub version: u64,
    pub state: Committed<E>,
}

type Hook = Box<dyn FnOnce() + Send>;
type StreamSlot<E> = Arc<Mutex<Option<EntityStream<E>>>>;

struct Attachment<E> {
    slot: StreamSlot<E>,
    task: Option<AbortHandle>,
}

impl<E> Attachment<E> {
    /// Stop forwarding and drop the upstream stream now
    fn detach(self) {
        if let Some(task) = self.task {
            task.abort();
        }
        let stream = self.slot.lock().take();
        drop(stream);
    }
}

struct Shared<E> {
    tx: Option<watch::Sender<Snapshot<E>>>,
    version: u64,
    generation: u64,
    attached: bool,
    disposed: bool,
    attachment: Option<Attachment<E>>,
    hooks: BTreeMap<u64, Hook>,
    next_hook: u64,
}

impl<E> Shared<E> {
    fn publish(&mut self, state: Committed<E>) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        self.version += 1;
        tx.send_replace(Snapshot {
            version: self.version,
            state,
        });
        true
    }
}

/// The committed-value cell, independent of the patch type
struct Cell<E: Entity> {
    shared: Mutex<Shared<E>>,
    rx: watch::Receiver<Snapshot<E>>,
}

impl<E: Entity> Cell<E> {
    fn new() -> Self {
        let (tx, rx) = watch::channel(Snapshot {
            version: 0,
            state: Committed::Pending,
        });
        Self {
            shared: Mutex::new(Shared {
                tx: Some(tx),
                version: 0,
                generation: 0,
                attached: false,
                disposed: false,
                attachment: None,
                hooks: BTreeMap::new(),
                next_hook: 0,
            }),
            rx,
        }
    }

    /// Publish only if `generation` is still the active source
    fn publish_if(&self, generation: u64, state: Committed<E>) -> bool {
        let mut shared = self.shared.lock();
        if shared.disposed || shared.generation != generation {
            return false;
        }
        shared.publish(state)
    }

    /// Dispose if `generation` is still the active source
    fn dispose(&self, generation: u64) {
        let (attachment, hooks, tx) = {
            let mut shared = self.shared.lock();
            if shared.disposed || shared.generation != generation {
                tracing::trace!(entity = E::NAME, generation, "stale source guard ignored");
                return;
            }
            shared.disposed = true;
            shared.attached = false;
            (
                shared.attachment.take(),
                std::mem::take(&mut shared.hooks),
                shared.tx.take(),
            )
        };
        if let Some(attachment) = attachment {
            attachment.detach();
        }
        for hook in hooks.into_values() {
            hook();
        }
        drop(tx);
        tracing::debug!(entity = E::NAME, generation, "context disposed");
    }
}

impl<E: Entity> Drop for Cell<E> {
    fn drop(&mut self) {
        let shared = self.shared.get_mut();
        if let Some(attachment) = shared.attachment.take() {
            attachment.detach();
        }
        for hook in std::mem::take(&mut shared.hooks).into_values() {
            hook();
        }
    }
}

async fn forward<E: Entity>(cell: Weak<Cell<E>>, generation: u64, slot: StreamSlot<E>) {
    loop {
        let item = poll_fn(|cx| match slot.lock().as_mut() {
            Some(stream) => stream.poll_next_unpin(cx),
            None => Poll::Ready(None),
        })
        .await;

        let Some(cell) = cell.upgrade() else {
            return;
        };
        match item {
            Some(Ok(entity)) => {
                if !cell.publish_if(generation, Committed::Ready(Arc::new(entity))) {
                    return;
                }
            }
            Some(Err(err)) => {
                tracing::warn!(entity = E::NAME, error = %err, "upstream source failed");
                cell.publish_if(generation, Committed::Failed(err));
                return;
            }
            None => {
                tracing::debug!(entity = E::NAME, generation, "upstream source completed");
                return;
            }
        }
    }
}

/// Handle returned when a source is attached
///
/// Disposing (or dropping) the handle detaches the source and completes the
/// context's committed stream. A handle whose source has since been replaced
/// does nothing.
#[must_use = "dropping a SourceGuard disposes the context"]
pub struct SourceGuard {
    disposer: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl SourceGuard {
    fn new<E: Entity>(cell: &Arc<Cell<E>>, generation: u64) -> Self {
        let cell = Arc::downgrade(cell);
        Self {
            disposer: Some(Box::new(move || {
                if let Some(cell) = cell.upgrade() {
                    cell.dispose(generation);
                }
            })),
        }
    }

    /// Detach the source and complete the committed stream
    pub fn dispose(mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }

    /// Keep the source attached for the rest of the context's life
    pub fn persist(mut self) {
        self.disposer = None;
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl std::fmt::Debug for SourceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceGuard")
            .field("armed", &self.disposer.is_some())
            .finish()
    }
}

/// Registration key returned by [`Context::on_dispose`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisposeHook(u64);

/// Exclusive editing-session claim on a context, released on drop
#[derive(Debug)]
pub struct SessionClaim {
    flag: Arc<AtomicBool>,
}

impl Drop for SessionClaim {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Committed value, source and create/commit lifecycle for one entity
pub struct Context<E: Entity, P> {
    cell: Arc<Cell<E>>,
    ops: Arc<dyn EntityOps<E, P>>,
    gate: Arc<tokio::sync::Mutex<()>>,
    session: Arc<AtomicBool>,
    timeout: Option<Duration>,
}

impl<E: Entity, P> Clone for Context<E, P> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            ops: Arc::clone(&self.ops),
            gate: Arc::clone(&self.gate),
            session: Arc::clone(&self.session),
            timeout: self.timeout,
        }
    }
}

impl<E: Entity, P> std::fmt::Debug for Context<E, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("entity", &E::NAME)
            .field("committed", &self.cell.rx.borrow().state)
            .finish_non_exhaustive()
    }
}

impl<E: Entity, P: Send + 'static> Context<E, P> {
    /// Context with no source attached and no timeout
    pub fn new(ops: Arc<dyn EntityOps<E, P>>) -> Self {
        Self {
            cell: Arc::new(Cell::new()),
            ops,
            gate: Arc::new(tokio::sync::Mutex::new(())),
            session: Arc::new(AtomicBool::new(false)),
            timeout: None,
        }
    }

    /// Context configured from [`LabConfig`]
    pub fn with_config(ops: Arc<dyn EntityOps<E, P>>, config: &LabConfig) -> Self {
        Self::new(ops).with_timeout(config.backend_timeout())
    }

    /// With timeout on create/commit calls
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Entity name for logs and errors
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        E::NAME
    }

    /// Attach the constant "no entity yet" source
    ///
    /// # Errors
    /// - `SourceAttached` if any source was attached before
    /// - `Disposed` after disposal
    pub fn init_create_context(&self) -> Result<SourceGuard, ContextError> {
        let generation = {
            let mut shared = self.cell.shared.lock();
            if shared.disposed {
                return Err(ContextError::Disposed { entity: E::NAME });
            }
            if shared.attached {
                return Err(ContextError::SourceAttached { entity: E::NAME });
            }
            shared.attached = true;
            shared.generation += 1;
            shared.publish(Committed::Absent);
            shared.generation
        };
        tracing::debug!(entity = E::NAME, generation, "create context initialised");
        Ok(SourceGuard::new(&self.cell, generation))
    }

    /// Attach `source` as the committed-value feed, replacing any previous one
    ///
    /// The previous source is dropped before this returns and can no longer
    /// publish. The committed state resets to `Pending` until `source` emits.
    ///
    /// # Errors
    /// - `NoRuntime` outside a Tokio runtime
    /// - `Disposed` after disposal
    pub fn send_committed(&self, source: EntityStream<E>) -> Result<SourceGuard, ContextError> {
        let runtime = Handle::try_current().map_err(|_| ContextError::NoRuntime)?;
        let slot: StreamSlot<E> = Arc::new(Mutex::new(Some(source)));

        let (generation, previous) = {
            let mut shared = self.cell.shared.lock();
            if shared.disposed {
                return Err(ContextError::Disposed { entity: E::NAME });
            }
            shared.attached = true;
            shared.generation += 1;
            shared.publish(Committed::Pending);
            (shared.generation, shared.attachment.take())
        };
        if let Some(previous) = previous {
            previous.detach();
            tracing::debug!(entity = E::NAME, generation, "source swapped");
        } else {
            tracing::debug!(entity = E::NAME, generation, "source attached");
        }

        let task = runtime.spawn(forward(
            Arc::downgrade(&self.cell),
            generation,
            Arc::clone(&slot),
        ));

        let attachment = Attachment {
            slot,
            task: Some(task.abort_handle()),
        };
        let superseded = {
            let mut shared = self.cell.shared.lock();
            if shared.disposed || shared.generation != generation {
                Some(attachment)
            } else {
                shared.attachment = Some(attachment);
                None
            }
        };
        if let Some(attachment) = superseded {
            attachment.detach();
        }
        Ok(SourceGuard::new(&self.cell, generation))
    }

    /// Current committed state
    #[must_use]
    pub fn committed(&self) -> Committed<E> {
        self.cell.rx.borrow().state.clone()
    }

    /// Current committed state with its version
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<E> {
        self.cell.rx.borrow().clone()
    }

    /// Committed entity
    ///
    /// # Errors
    /// - `NotReady` while pending
    /// - `NotCreated` before creation
    /// - the source's error if it failed
    pub fn entity(&self) -> Result<Arc<E>, ContextError> {
        Self::settled_entity(self.committed())
    }

    /// Wait until the source settles, then return the entity
    ///
    /// # Errors
    /// - `NotCreated` if the context settles as pre-creation
    /// - `Disposed` if the context is disposed while waiting
    /// - the source's error if it failed
    pub async fn resolved(&self) -> Result<Arc<E>, ContextError> {
        let mut rx = self.cell.rx.clone();
        let state = rx
            .wait_for(|snapshot| snapshot.state.is_settled())
            .await
            .map_err(|_| ContextError::Disposed { entity: E::NAME })?
            .state
            .clone();
        Self::settled_entity(state)
    }

    fn settled_entity(state: Committed<E>) -> Result<Arc<E>, ContextError> {
        match state {
            Committed::Ready(entity) => Ok(entity),
            Committed::Pending => Err(ContextError::NotReady { entity: E::NAME }),
            Committed::Absent => Err(ContextError::NotCreated { entity: E::NAME }),
            Committed::Failed(err) => Err(err),
        }
    }

    /// Raw receiver over every published snapshot
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<E>> {
        self.cell.rx.clone()
    }

    /// Stream of committed entities
    ///
    /// Yields the current entity (if any) and every later one. A failed
    /// source yields its error and ends the stream. Disposal ends it.
    pub fn entities(&self) -> BoxStream<'static, Result<Arc<E>, ContextError>> {
        let mut rx = self.cell.rx.clone();
        rx.mark_changed();
        stream::unfold(Some(rx), |rx| async move {
            let mut rx = rx?;
            loop {
                if rx.changed().await.is_err() {
                    return None;
                }
                let state = rx.borrow_and_update().state.clone();
                match state {
                    Committed::Ready(entity) => return Some((Ok(entity), Some(rx))),
                    Committed::Failed(err) => return Some((Err(err), None)),
                    Committed::Pending | Committed::Absent => continue,
                }
            }
        })
        .boxed()
    }

    /// Create the entity from `patch`
    ///
    /// Valid only while the context is pre-creation. The new entity is
    /// published before this returns.
    ///
    /// # Errors
    /// - `CommitInProgress` if another create/commit is running
    /// - `AlreadyCreated` if an entity exists
    /// - `NotReady` while the source is pending
    /// - backend errors from the injected ops
    pub async fn create(&self, patch: P) -> Result<E, ContextError> {
        let _permit = self
            .gate
            .try_lock()
            .map_err(|_| ContextError::CommitInProgress { entity: E::NAME })?;

        let generation = {
            let shared = self.cell.shared.lock();
            if shared.disposed {
                return Err(ContextError::Disposed { entity: E::NAME });
            }
            match &self.cell.rx.borrow().state {
                Committed::Absent => {}
                Committed::Ready(_) => return Err(ContextError::AlreadyCreated { entity: E::NAME }),
                Committed::Pending => return Err(ContextError::NotReady { entity: E::NAME }),
                Committed::Failed(err) => return Err(err.clone()),
            }
            shared.generation
        };

        tracing::info!(entity = E::NAME, "creating");
        let entity = self.bounded(self.ops.create(patch)).await?;
        if !self
            .cell
            .publish_if(generation, Committed::Ready(Arc::new(entity.clone())))
        {
            tracing::debug!(entity = E::NAME, "source changed during create; result not published");
        }
        tracing::info!(entity = E::NAME, id = %entity.id(), "created");
        Ok(entity)
    }

    /// Update the committed entity with `patch`
    ///
    /// The updated entity is published before this returns.
    ///
    /// # Errors
    /// - `CommitInProgress` if another create/commit is running
    /// - `NotCreated` before creation
    /// - `NotReady` while the source is pending
    /// - backend errors from the injected ops
    pub async fn commit(&self, patch: P) -> Result<E, ContextError> {
        let _permit = self
            .gate
            .try_lock()
            .map_err(|_| ContextError::CommitInProgress { entity: E::NAME })?;

        let (generation, current) = {
            let shared = self.cell.shared.lock();
            if shared.disposed {
                return Err(ContextError::Disposed { entity: E::NAME });
            }
            let current = match &self.cell.rx.borrow().state {
                Committed::Ready(entity) => Arc::clone(entity),
                Committed::Absent => return Err(ContextError::NotCreated { entity: E::NAME }),
                Committed::Pending => return Err(ContextError::NotReady { entity: E::NAME }),
                Committed::Failed(err) => return Err(err.clone()),
            };
            (shared.generation, current)
        };

        let id = current.id();
        tracing::info!(entity = E::NAME, %id, "committing");
        let entity = self.bounded(self.ops.update(&id, patch)).await?;
        if !self
            .cell
            .publish_if(generation, Committed::Ready(Arc::new(entity.clone())))
        {
            tracing::debug!(entity = E::NAME, %id, "source changed during commit; result not published");
        }
        tracing::info!(entity = E::NAME, %id, "committed");
        Ok(entity)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ContextError>>,
    ) -> Result<T, ContextError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                ContextError::Backend(BackendError::Timeout {
                    millis: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                })
            })?,
            None => call.await,
        }
    }

    /// Run `hook` when the context is disposed; immediately if it already was
    ///
    /// Hooks run once, in registration order. Owners that go away before the
    /// context should hand the key back to [`Context::remove_dispose_hook`].
    pub fn on_dispose(&self, hook: impl FnOnce() + Send + 'static) -> DisposeHook {
        let mut shared = self.cell.shared.lock();
        let key = shared.next_hook;
        shared.next_hook += 1;
        if shared.disposed {
            drop(shared);
            hook();
        } else {
            shared.hooks.insert(key, Box::new(hook));
        }
        DisposeHook(key)
    }

    /// Deregister a dispose hook without running it
    ///
    /// Returns `false` if the hook already ran or was removed.
    pub fn remove_dispose_hook(&self, key: DisposeHook) -> bool {
        self.cell.shared.lock().hooks.remove(&key.0).is_some()
    }

    /// Number of dispose hooks still pending
    #[must_use]
    pub fn dispose_hook_count(&self) -> usize {
        self.cell.shared.lock().hooks.len()
    }

    /// Whether the context was disposed
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.cell.shared.lock().disposed
    }

    /// Claim the single editing session on this context
    ///
    /// # Errors
    /// Returns `SessionActive` while another claim is alive
    pub fn claim_session(&self) -> Result<SessionClaim, ContextError> {
        self.session
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ContextError::SessionActive { entity: E::NAME })?;
        Ok(SessionClaim {
            flag: Arc::clone(&self.session),
        })
    }
}

impl<E: Entity, P: EntityPatch> Context<E, P> {
    /// Context whose create/commit go straight to `backend`
    pub fn from_backend(backend: Arc<dyn Backend<E>>) -> Self {
        Self::new(Arc::new(BackendOps::<E, P>::new(backend)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone, PartialEq)]
    struct Counter {
        id: u32,
        value: i64,
    }

    impl Entity for Counter {
        type Id = u32;
        const NAME: &'static str = "counter";

        fn id(&self) -> u32 {
            self.id
        }
    }

    fn ops() -> Arc<dyn EntityOps<Counter, i64>> {
        Arc::new(FnOps::<Counter, i64>::new(
            |value| async move { Ok::<_, ContextError>(Counter { id: 1, value }) }.boxed(),
            |id, delta| async move { Ok::<_, ContextError>(Counter { id, value: delta }) }.boxed(),
        ))
    }

    #[tokio::test]
    async fn create_then_commit_publishes_before_returning() {
        let ctx = Context::new(ops());
        let _guard = ctx.init_create_context().unwrap();
        assert!(matches!(ctx.committed(), Committed::Absent));

        let created = ctx.create(5).await.unwrap();
        assert_eq!(ctx.entity().unwrap().as_ref(), &created);

        let updated = ctx.commit(7).await.unwrap();
        assert_eq!(ctx.entity().unwrap().value, 7);
        assert_eq!(updated.id, 1);
    }

    #[tokio::test]
    async fn lifecycle_misuse_is_rejected() {
        let ctx = Context::new(ops());
        assert_eq!(
            ctx.commit(1).await.unwrap_err(),
            ContextError::NotReady { entity: "counter" }
        );

        let _guard = ctx.init_create_context().unwrap();
        assert_eq!(
            ctx.init_create_context().unwrap_err(),
            ContextError::SourceAttached { entity: "counter" }
        );
        assert_eq!(
            ctx.commit(1).await.unwrap_err(),
            ContextError::NotCreated { entity: "counter" }
        );

        ctx.create(1).await.unwrap();
        assert_eq!(
            ctx.create(2).await.unwrap_err(),
            ContextError::AlreadyCreated { entity: "counter" }
        );
    }

    #[tokio::test]
    async fn versions_increase() {
        let ctx = Context::new(ops());
        let _guard = ctx.init_create_context().unwrap();
        let before = ctx.snapshot().version;
        ctx.create(1).await.unwrap();
        let after = ctx.snapshot().version;
        assert!(after > before);
    }

    #[test]
    fn send_committed_needs_runtime() {
        let ctx = Context::new(ops());
        let err = ctx.send_committed(stream::empty().boxed()).unwrap_err();
        assert_eq!(err, ContextError::NoRuntime);
    }

    #[tokio::test]
    async fn session_is_exclusive_until_released() {
        let ctx = Context::new(ops());
        let claim = ctx.claim_session().unwrap();
        assert_eq!(
            ctx.claim_session().unwrap_err(),
            ContextError::SessionActive { entity: "counter" }
        );
        drop(claim);
        assert!(ctx.claim_session().is_ok());
    }

    #[tokio::test]
    async fn removed_dispose_hook_never_runs() {
        let ctx = Context::new(ops());
        let guard = ctx.init_create_context().unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        let kept = ran.clone();
        ctx.on_dispose(move || {
            kept.fetch_add(1, Ordering::SeqCst);
        });
        let dropped = ran.clone();
        let key = ctx.on_dispose(move || {
            dropped.fetch_add(10, Ordering::SeqCst);
        });
        assert_eq!(ctx.dispose_hook_count(), 2);
        assert!(ctx.remove_dispose_hook(key));
        assert!(!ctx.remove_dispose_hook(key));
        assert_eq!(ctx.dispose_hook_count(), 1);

        guard.dispose();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.dispose_hook_count(), 0);
    }

    #[tokio::test]
    async fn timeout_surfaces_as_backend_error() {
        let slow: Arc<dyn EntityOps<Counter, i64>> = Arc::new(FnOps::<Counter, i64>::new(
            |value| {
                async move {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok::<_, ContextError>(Counter { id: 1, value })
                }
                .boxed()
            },
            |id, value| async move { Ok::<_, ContextError>(Counter { id, value }) }.boxed(),
        ));
        let ctx = Context::new(slow).with_timeout(Some(Duration::from_millis(10)));
        let _guard = ctx.init_create_context().unwrap();
        assert_eq!(
            ctx.create(1).await.unwrap_err(),
            ContextError::Backend(BackendError::Timeout { millis: 10 })
        );
        assert!(matches!(ctx.committed(), Committed::Absent));
    }
}
