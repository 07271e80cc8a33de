//! Backend collaborator
//!
//! The backend owns persistence. Contexts talk to it only through
//! [`EntityOps`], and [`BackendOps`] adapts any [`Backend`] to that seam by
//! encoding patches with [`EntityPatch::to_json`].

use crate::context::EntityOps;
use crate::entity::{Entity, EntityPatch};
use crate::error::{BackendError, ContextError};
use async_trait::async_trait;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Persistence collaborator for one entity type
#[async_trait]
pub trait Backend<E: Entity>: Send + Sync {
    /// Look up one entity
    async fn fetch(&self, id: &E::Id) -> Result<E, BackendError>;

    /// Create an entity from a JSON patch
    async fn create(&self, patch: Value) -> Result<E, BackendError>;

    /// Apply a JSON patch to an existing entity
    async fn update(&self, id: &E::Id, patch: Value) -> Result<E, BackendError>;

    /// Entities matching a JSON filter object
    async fn query(&self, filter: Value) -> Result<Vec<E>, BackendError>;
}

#[async_trait]
impl<E: Entity, B: Backend<E> + ?Sized> Backend<E> for Arc<B> {
    async fn fetch(&self, id: &E::Id) -> Result<E, BackendError> {
        (**self).fetch(id).await
    }

    async fn create(&self, patch: Value) -> Result<E, BackendError> {
        (**self).create(patch).await
    }

    async fn update(&self, id: &E::Id, patch: Value) -> Result<E, BackendError> {
        (**self).update(id, patch).await
    }

    async fn query(&self, filter: Value) -> Result<Vec<E>, BackendError> {
        (**self).query(filter).await
    }
}

/// [`EntityOps`] backed by a [`Backend`]
pub struct BackendOps<E: Entity, P> {
    backend: Arc<dyn Backend<E>>,
    _patch: PhantomData<fn(P)>,
}

impl<E: Entity, P> BackendOps<E, P> {
    /// Wrap a backend
    #[inline]
    #[must_use]
    pub fn new(backend: Arc<dyn Backend<E>>) -> Self {
        Self {
            backend,
            _patch: PhantomData,
        }
    }

    /// Underlying backend
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend<E>> {
        &self.backend
    }
}

#[async_trait]
impl<E: Entity, P: EntityPatch> EntityOps<E, P> for BackendOps<E, P> {
    async fn create(&self, patch: P) -> Result<E, ContextError> {
        let json = patch.to_json()?;
        Ok(self.backend.create(json).await?)
    }

    async fn update(&self, id: &E::Id, patch: P) -> Result<E, ContextError> {
        let json = patch.to_json()?;
        Ok(self.backend.update(id, json).await?)
    }
}
