//! Owner-based cascading deletion

use gantry_core::domain::{Kind, ObjectKey};

use crate::error::StoreError;
use crate::store::ObjectStore;

/// Deletes an object and everything it transitively owns.
///
/// The owned tree is collected first and removed leaves-first. Objects that
/// vanish mid-way are skipped. Returns the number of objects deleted.
pub async fn cascade_delete<S>(store: &S, kind: Kind, key: &ObjectKey) -> Result<usize, StoreError>
where
    S: ObjectStore + ?Sized,
{
    let mut tree = vec![(kind, key.clone())];
    let mut cursor = 0;

    while cursor < tree.len() {
        let (owner_kind, owner_key) = tree[cursor].clone();
        cursor += 1;

        for child_kind in Kind::ALL {
            let children = store.list(child_kind, Some(&owner_key.namespace)).await?;
            for child in children {
                if child.meta().is_owned_by(owner_kind, &owner_key.name) {
                    tree.push((child_kind, child.key()));
                }
            }
        }
    }

    let mut deleted = 0;
    for (kind, key) in tree.iter().rev() {
        match store.delete(*kind, key).await {
            Ok(()) => deleted += 1,
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
    }

    tracing::debug!(%kind, %key, deleted, "Cascade delete finished");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::StoreExt;
    use gantry_core::domain::{LocalStorage, LocalStorageSpec, ObjectMeta};

    fn record(name: &str, owner: Option<&str>) -> LocalStorage {
        let mut metadata = ObjectMeta::new("default", name);
        if let Some(owner) = owner {
            metadata = metadata.with_owner(Kind::LocalStorage, owner);
        }
        LocalStorage {
            metadata,
            spec: LocalStorageSpec {
                key: name.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_cascade_removes_descendants_only() {
        let store = MemoryStore::new();
        store.create_resource(record("root", None)).await.unwrap();
        store.create_resource(record("child", Some("root"))).await.unwrap();
        store
            .create_resource(record("grandchild", Some("child")))
            .await
            .unwrap();
        store.create_resource(record("unrelated", None)).await.unwrap();

        let deleted = cascade_delete(&store, Kind::LocalStorage, &ObjectKey::new("default", "root"))
            .await
            .unwrap();
        assert_eq!(deleted, 3);

        let remaining: Vec<LocalStorage> = store.list_resources(None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].metadata.name, "unrelated");
    }

    #[tokio::test]
    async fn test_cascade_of_missing_object_deletes_nothing() {
        let store = MemoryStore::new();
        let deleted = cascade_delete(&store, Kind::Pipeline, &ObjectKey::new("default", "ghost"))
            .await
            .unwrap();
        assert_eq!(deleted, 0);
    }
}
