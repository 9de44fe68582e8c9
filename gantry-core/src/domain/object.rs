//! Tagged envelope over every stored record

use serde::{Deserialize, Serialize};

use super::artifact::Artifact;
use super::git::GitArtifactResolution;
use super::git_source::GitSource;
use super::job::Job;
use super::meta::{Kind, ObjectKey, ObjectMeta};
use super::pipeline::Pipeline;
use super::stage::Stage;
use super::storage::LocalStorage;
use super::task::Task;
use super::workflow::WorkflowTemplate;

/// Any record the object store holds, serialized with a `kind` tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Object {
    WorkflowTemplate(WorkflowTemplate),
    Pipeline(Pipeline),
    Stage(Stage),
    Task(Task),
    Artifact(Artifact),
    GitArtifactResolution(GitArtifactResolution),
    Job(Job),
    LocalStorage(LocalStorage),
    GitSource(GitSource),
}

/// A concrete record type that can be stored as an [`Object`]
pub trait Resource: Clone + Send + Sync + Sized + 'static {
    const KIND: Kind;

    fn meta(&self) -> &ObjectMeta;
    fn meta_mut(&mut self) -> &mut ObjectMeta;
    fn into_object(self) -> Object;
    fn from_object(object: Object) -> Option<Self>;

    fn key(&self) -> ObjectKey {
        self.meta().key()
    }
}

macro_rules! impl_resource {
    ($($ty:ident),* $(,)?) => {
        $(
            impl Resource for $ty {
                const KIND: Kind = Kind::$ty;

                fn meta(&self) -> &ObjectMeta {
                    &self.metadata
                }

                fn meta_mut(&mut self) -> &mut ObjectMeta {
                    &mut self.metadata
                }

                fn into_object(self) -> Object {
                    Object::$ty(self)
                }

                fn from_object(object: Object) -> Option<Self> {
                    match object {
                        Object::$ty(inner) => Some(inner),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Object {
                fn from(value: $ty) -> Self {
                    Object::$ty(value)
                }
            }
        )*

        impl Object {
            pub fn kind(&self) -> Kind {
                match self {
                    $(Object::$ty(_) => Kind::$ty,)*
                }
            }

            pub fn meta(&self) -> &ObjectMeta {
                match self {
                    $(Object::$ty(inner) => &inner.metadata,)*
                }
            }

            pub fn meta_mut(&mut self) -> &mut ObjectMeta {
                match self {
                    $(Object::$ty(inner) => &mut inner.metadata,)*
                }
            }
        }
    };
}

impl_resource!(
    WorkflowTemplate,
    Pipeline,
    Stage,
    Task,
    Artifact,
    GitArtifactResolution,
    Job,
    LocalStorage,
    GitSource,
);

impl Object {
    pub fn key(&self) -> ObjectKey {
        self.meta().key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::storage::LocalStorageSpec;

    #[test]
    fn test_object_tagged_by_kind() {
        let storage = LocalStorage {
            metadata: ObjectMeta::new("default", "blob-1"),
            spec: LocalStorageSpec {
                key: "blob-1/blob-1.tar.gz".to_string(),
            },
        };
        let object = storage.clone().into_object();
        assert_eq!(object.kind(), Kind::LocalStorage);

        let json = serde_json::to_value(&object).unwrap();
        assert_eq!(json["kind"], "LocalStorage");
        assert_eq!(json["metadata"]["name"], "blob-1");

        let back: Object = serde_json::from_value(json).unwrap();
        assert_eq!(LocalStorage::from_object(back), Some(storage));
    }

    #[test]
    fn test_from_object_rejects_other_kinds() {
        let storage = LocalStorage {
            metadata: ObjectMeta::new("default", "x"),
            spec: LocalStorageSpec { key: "x".to_string() },
        };
        assert!(Pipeline::from_object(storage.into_object()).is_none());
    }
}
