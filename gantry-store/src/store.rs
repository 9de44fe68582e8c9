//! Object store contract

use async_trait::async_trait;
use gantry_core::domain::{Kind, Object, ObjectKey, OwnerRef, Resource};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Created,
    Updated,
    Deleted,
}

/// Change notification emitted after every successful write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub kind: Kind,
    pub key: ObjectKey,
    pub owner: Option<OwnerRef>,
    pub event: EventType,
}

impl WatchEvent {
    pub fn new(object: &Object, event: EventType) -> Self {
        Self {
            kind: object.kind(),
            key: object.key(),
            owner: object.meta().owner.clone(),
            event,
        }
    }

    /// Key of the owning object, which lives in the same namespace
    pub fn owner_key(&self) -> Option<(Kind, ObjectKey)> {
        self.owner.as_ref().map(|owner| {
            (
                owner.kind,
                ObjectKey::new(self.key.namespace.clone(), owner.name.clone()),
            )
        })
    }
}

/// Versioned, namespaced record store.
///
/// `create` fails with `AlreadyExists` when the name is taken. `update` fails
/// with `Conflict` when the object's `resource_version` no longer matches the
/// stored one. Both return the object as stored, with its new version.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<Option<Object>, StoreError>;

    async fn create(&self, object: Object) -> Result<Object, StoreError>;

    async fn update(&self, object: Object) -> Result<Object, StoreError>;

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<(), StoreError>;

    async fn list(&self, kind: Kind, namespace: Option<&str>) -> Result<Vec<Object>, StoreError>;

    /// Subscribe to change notifications. Slow receivers may lag and must
    /// fall back to listing.
    fn watch(&self) -> broadcast::Receiver<WatchEvent>;
}

/// Typed helpers over [`ObjectStore`]
#[async_trait]
pub trait StoreExt: ObjectStore {
    async fn fetch<R: Resource>(&self, key: &ObjectKey) -> Result<Option<R>, StoreError> {
        match self.get(R::KIND, key).await? {
            Some(object) => R::from_object(object)
                .map(Some)
                .ok_or(StoreError::KindMismatch { expected: R::KIND }),
            None => Ok(None),
        }
    }

    async fn create_resource<R: Resource>(&self, resource: R) -> Result<R, StoreError> {
        let stored = self.create(resource.into_object()).await?;
        R::from_object(stored).ok_or(StoreError::KindMismatch { expected: R::KIND })
    }

    async fn update_resource<R: Resource>(&self, resource: R) -> Result<R, StoreError> {
        let stored = self.update(resource.into_object()).await?;
        R::from_object(stored).ok_or(StoreError::KindMismatch { expected: R::KIND })
    }

    async fn list_resources<R: Resource>(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<R>, StoreError> {
        let objects = self.list(R::KIND, namespace).await?;
        Ok(objects.into_iter().filter_map(R::from_object).collect())
    }

    /// Resources of type `R` owned by `owner_kind`/`owner` in its namespace
    async fn list_owned<R: Resource>(
        &self,
        owner_kind: Kind,
        owner: &ObjectKey,
    ) -> Result<Vec<R>, StoreError> {
        let resources = self.list_resources::<R>(Some(&owner.namespace)).await?;
        Ok(resources
            .into_iter()
            .filter(|r| r.meta().is_owned_by(owner_kind, &owner.name))
            .collect())
    }

    /// Returns the stored resource and whether this call created it.
    ///
    /// Looks first so a repeated call performs no write. Losing a creation
    /// race counts as finding the existing object.
    async fn get_or_create<R: Resource>(&self, resource: R) -> Result<(R, bool), StoreError> {
        let key = resource.key();
        if let Some(existing) = self.fetch::<R>(&key).await? {
            return Ok((existing, false));
        }

        match self.create_resource(resource).await {
            Ok(created) => Ok((created, true)),
            Err(e) if e.is_already_exists() => match self.fetch::<R>(&key).await? {
                Some(existing) => Ok((existing, false)),
                None => Err(StoreError::NotFound {
                    kind: R::KIND,
                    key,
                }),
            },
            Err(e) => Err(e),
        }
    }
}

impl<S: ObjectStore + ?Sized> StoreExt for S {}
