//! In-process object store

use async_trait::async_trait;
use chrono::Utc;
use gantry_core::domain::{Kind, Object, ObjectKey};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, broadcast};

use crate::error::StoreError;
use crate::store::{EventType, ObjectStore, WatchEvent};

const EVENT_CAPACITY: usize = 1024;

/// Object store backed by a map, with the same versioning and notification
/// behavior as the database store.
pub struct MemoryStore {
    objects: RwLock<HashMap<(Kind, ObjectKey), Object>>,
    writes: AtomicU64,
    events: broadcast::Sender<WatchEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            objects: RwLock::new(HashMap::new()),
            writes: AtomicU64::new(0),
            events,
        }
    }

    /// Number of successful create/update/delete calls so far
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn notify(&self, object: &Object, event: EventType) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        // No subscribers is fine
        let _ = self.events.send(WatchEvent::new(object, event));
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, kind: Kind, key: &ObjectKey) -> Result<Option<Object>, StoreError> {
        let objects = self.objects.read().await;
        Ok(objects.get(&(kind, key.clone())).cloned())
    }

    async fn create(&self, mut object: Object) -> Result<Object, StoreError> {
        let kind = object.kind();
        let key = object.key();

        let mut objects = self.objects.write().await;
        if objects.contains_key(&(kind, key.clone())) {
            return Err(StoreError::AlreadyExists { kind, key });
        }

        let meta = object.meta_mut();
        meta.resource_version = 1;
        meta.created_at = Some(Utc::now());
        objects.insert((kind, key), object.clone());
        drop(objects);

        self.notify(&object, EventType::Created);
        Ok(object)
    }

    async fn update(&self, mut object: Object) -> Result<Object, StoreError> {
        let kind = object.kind();
        let key = object.key();

        let mut objects = self.objects.write().await;
        let current = objects
            .get(&(kind, key.clone()))
            .ok_or_else(|| StoreError::NotFound {
                kind,
                key: key.clone(),
            })?;

        let actual = current.meta().resource_version;
        let expected = object.meta().resource_version;
        if actual != expected {
            return Err(StoreError::Conflict {
                kind,
                key,
                expected,
                actual,
            });
        }

        let created_at = current.meta().created_at;
        let meta = object.meta_mut();
        meta.resource_version = actual + 1;
        meta.created_at = created_at;
        objects.insert((kind, key), object.clone());
        drop(objects);

        self.notify(&object, EventType::Updated);
        Ok(object)
    }

    async fn delete(&self, kind: Kind, key: &ObjectKey) -> Result<(), StoreError> {
        let removed = self.objects.write().await.remove(&(kind, key.clone()));
        match removed {
            Some(object) => {
                self.notify(&object, EventType::Deleted);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind,
                key: key.clone(),
            }),
        }
    }

    async fn list(&self, kind: Kind, namespace: Option<&str>) -> Result<Vec<Object>, StoreError> {
        let objects = self.objects.read().await;
        let mut matching: Vec<Object> = objects
            .iter()
            .filter(|((k, key), _)| {
                *k == kind && namespace.is_none_or(|ns| key.namespace == ns)
            })
            .map(|(_, object)| object.clone())
            .collect();
        matching.sort_by_key(|object| object.key());
        Ok(matching)
    }

    fn watch(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }
}
