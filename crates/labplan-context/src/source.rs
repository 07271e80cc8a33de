//! Upstream source builders
//!
//! A context's committed value comes from an [`EntityStream`]. These helpers
//! build the usual shapes: a fixed value, a manual feed, ids resolved through
//! the backend, a child derived from a parent context, and a user selection
//! resolved through a query.

use crate::backend::Backend;
use crate::context::Context;
use crate::entity::Entity;
use crate::error::{BackendError, ContextError};
use futures::channel::mpsc;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::sync::Arc;

/// Feed of committed values for a context
pub type EntityStream<E> = BoxStream<'static, Result<E, ContextError>>;

/// Emit `value` once
pub fn fixed<E: Entity>(value: E) -> EntityStream<E> {
    stream::once(async move { Ok(value) }).boxed()
}

/// Emit `err` once; the context settles as failed
pub fn failed<E: Entity>(err: ContextError) -> EntityStream<E> {
    stream::once(async move { Err(err) }).boxed()
}

/// Sender half of [`manual`]
#[derive(Debug)]
pub struct Feed<E> {
    tx: mpsc::UnboundedSender<Result<E, ContextError>>,
}

impl<E> Clone for Feed<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E> Feed<E> {
    /// Push a value; false once the stream is gone
    pub fn send(&self, value: E) -> bool {
        self.tx.unbounded_send(Ok(value)).is_ok()
    }

    /// Push a terminal error
    pub fn fail(&self, err: ContextError) -> bool {
        self.tx.unbounded_send(Err(err)).is_ok()
    }

    /// Whether the receiving stream was dropped
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A stream fed by hand through the returned [`Feed`]
#[must_use]
pub fn manual<E: Entity>() -> (Feed<E>, EntityStream<E>) {
    let (tx, rx) = mpsc::unbounded();
    (Feed { tx }, rx.boxed())
}

/// Resolve each emitted id with `fetch`, in order
pub fn from_ids<E, I, F>(ids: impl Stream<Item = I> + Send + 'static, fetch: F) -> EntityStream<E>
where
    E: Entity,
    I: Send + 'static,
    F: Fn(I) -> BoxFuture<'static, Result<E, BackendError>> + Send + 'static,
{
    ids.then(fetch)
        .map(|result| result.map_err(ContextError::from))
        .boxed()
}

/// Resolve each emitted id through `backend.fetch`
pub fn fetch_by_id<E: Entity>(
    backend: Arc<dyn Backend<E>>,
    ids: impl Stream<Item = E::Id> + Send + 'static,
) -> EntityStream<E> {
    from_ids(ids, move |id: E::Id| {
        let backend = Arc::clone(&backend);
        async move { backend.fetch(&id).await }.boxed()
    })
}

/// Resolve each emitted filter to the first backend match
///
/// An empty result is `NotFound`.
pub fn selected<E: Entity>(
    backend: Arc<dyn Backend<E>>,
    filters: impl Stream<Item = Value> + Send + 'static,
) -> EntityStream<E> {
    from_ids(filters, move |filter: Value| {
        let backend = Arc::clone(&backend);
        async move {
            let key = filter.to_string();
            backend
                .query(filter)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| BackendError::not_found(E::NAME, key))
        }
        .boxed()
    })
}

struct Latest<A, B> {
    parent: BoxStream<'static, Result<Arc<A>, ContextError>>,
    params: Option<BoxStream<'static, B>>,
    a: Option<Arc<A>>,
    b: Option<B>,
}

async fn next_param<B>(params: &mut Option<BoxStream<'static, B>>) -> Option<B> {
    match params {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

/// Combine the latest parent entity with the latest parameter
///
/// Emits only once both sides have produced a value, so nothing comes out
/// before the parent's first entity. Ends when the parent ends; a parent
/// error is forwarded and ends the stream. An exhausted parameter stream
/// keeps its last value.
pub fn with_latest<A, B>(
    parent: BoxStream<'static, Result<Arc<A>, ContextError>>,
    params: impl Stream<Item = B> + Send + 'static,
) -> BoxStream<'static, Result<(Arc<A>, B), ContextError>>
where
    A: Send + Sync + 'static,
    B: Clone + Send + 'static,
{
    let state = Latest {
        parent,
        params: Some(params.boxed()),
        a: None,
        b: None,
    };
    stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        loop {
            let Latest {
                parent,
                params,
                a,
                b,
            } = &mut state;
            tokio::select! {
                item = parent.next() => match item {
                    None => return None,
                    Some(Err(err)) => return Some((Err(err), None)),
                    Some(Ok(value)) => *a = Some(value),
                },
                item = next_param(params) => match item {
                    None => *params = None,
                    Some(value) => *b = Some(value),
                },
            }
            if let (Some(a), Some(b)) = (&state.a, &state.b) {
                let out = (Arc::clone(a), b.clone());
                return Some((Ok(out), Some(state)));
            }
        }
    })
    .boxed()
}

/// Source for a child context derived from `parent`
///
/// Each (parent entity, parameter) pair is passed to `resolve`. The child
/// never resolves before the parent has.
pub fn child_of<E, PE, PP, Q, F>(
    parent: &Context<PE, PP>,
    params: impl Stream<Item = Q> + Send + 'static,
    resolve: F,
) -> EntityStream<E>
where
    E: Entity,
    PE: Entity,
    PP: Send + 'static,
    Q: Clone + Send + 'static,
    F: Fn(Arc<PE>, Q) -> BoxFuture<'static, Result<E, ContextError>> + Send + Sync + 'static,
{
    let resolve = Arc::new(resolve);
    with_latest(parent.entities(), params)
        .then(move |pair| {
            let resolve = Arc::clone(&resolve);
            async move {
                let (parent, param) = pair?;
                resolve(parent, param).await
            }
        })
        .boxed()
}
