//! Core traits for persistable entities and their document mapping.
//!
//! An [`Entity`] is an application record stored in one collection and identified by a store
//! generated [`ObjectId`]. The identity is a dedicated attribute of the entity: it is never part
//! of the serde mapping and travels on the wire under the reserved [`ID_KEY`].
//!
//! [`EntityExt`] is the structural mapper between entities and documents. It is implemented for
//! every entity through serde and bson.

use bson::{Bson, Document, de::deserialize_from_document, oid::ObjectId, ser::serialize_to_document};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{ModelError, ModelResult};

/// Reserved document key holding the identity.
pub const ID_KEY: &str = "_id";

/// Core trait that every persisted entity must implement.
///
/// Usually derived with `#[derive(Entity)]` from the `docmodel` crate, which resolves the
/// collection name from the lower-cased type name unless `#[entity(collection = "...")]` is
/// given.
///
/// # Example
///
/// ```ignore
/// use docmodel::entity::Entity;
/// use bson::oid::ObjectId;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     #[serde(skip)]
///     pub id: Option<ObjectId>,
///     pub name: String,
/// }
///
/// impl Entity for User {
///     fn collection_name() -> &'static str {
///         "user"
///     }
///
///     fn id(&self) -> Option<ObjectId> {
///         self.id
///     }
///
///     fn set_id(&mut self, id: ObjectId) {
///         self.id = Some(id);
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the name of the collection this entity type is stored in.
    ///
    /// Resolved once per type; it must not change for the lifetime of the program.
    fn collection_name() -> &'static str;

    /// Returns the identity, or `None` if the entity has never been saved.
    fn id(&self) -> Option<ObjectId>;

    /// Assigns the identity.
    fn set_id(&mut self, id: ObjectId);
}

/// Extension trait converting entities to and from documents.
///
/// This trait is automatically implemented for all types that implement [`Entity`].
pub trait EntityExt: Entity + Sized {
    /// Converts this entity to a document. The identity is never included.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Serialization`] if the entity cannot be represented as a
    /// document (for example when it serializes to a scalar).
    fn to_document(&self) -> ModelResult<Document>;

    /// Creates an entity from a document that no longer carries an identity.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ArgumentMismatch`] if the document does not fit the entity.
    fn from_document(document: Document) -> ModelResult<Self>;
}

impl<E: Entity> EntityExt for E {
    fn to_document(&self) -> ModelResult<Document> {
        let mut document = serialize_to_document(self)?;
        document.remove(ID_KEY);

        Ok(document)
    }

    fn from_document(document: Document) -> ModelResult<Self> {
        deserialize_from_document(document).map_err(|e| ModelError::ArgumentMismatch(e.to_string()))
    }
}

/// How a cursor treats the identity of each document it materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdentityPolicy {
    /// Strip `_id` and assign it to the entity; an `_id` that is not an ObjectId skips the
    /// document.
    Require,
    /// Strip `_id` and assign it to the entity when it is an ObjectId.
    Restore,
    /// Strip `_id` and drop it.
    Discard,
}

/// A document that could not be mapped into an entity and was left out of a result.
#[derive(Debug)]
pub struct SkippedDocument {
    /// Identity of the document, when it carried an ObjectId.
    pub id: Option<ObjectId>,
    /// Why mapping failed.
    pub error: ModelError,
}

/// Strips the identity from a document, maps the remainder and applies the identity policy.
pub(crate) fn materialize<E: Entity>(
    mut document: Document,
    policy: IdentityPolicy,
) -> Result<E, SkippedDocument> {
    let raw_id = document.remove(ID_KEY);
    let id = raw_id.as_ref().and_then(Bson::as_object_id);

    if let (IdentityPolicy::Require, Some(raw), None) = (policy, &raw_id, id) {
        return Err(SkippedDocument {
            id: None,
            error: ModelError::ArgumentMismatch(format!("_id must be an ObjectId, got {raw}")),
        });
    }

    match E::from_document(document) {
        Ok(mut entity) => {
            if let (IdentityPolicy::Require | IdentityPolicy::Restore, Some(id)) = (policy, id) {
                entity.set_id(id);
            }

            Ok(entity)
        }
        Err(error) => Err(SkippedDocument { id, error }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub(crate) struct Person {
        #[serde(skip)]
        pub id: Option<ObjectId>,
        pub name: String,
        pub age: i32,
    }

    impl Person {
        pub(crate) fn new(name: &str, age: i32) -> Self {
            Self { id: None, name: name.to_string(), age }
        }
    }

    impl Entity for Person {
        fn collection_name() -> &'static str {
            "person"
        }

        fn id(&self) -> Option<ObjectId> {
            self.id
        }

        fn set_id(&mut self, id: ObjectId) {
            self.id = Some(id);
        }
    }

    #[test]
    fn test_to_document_excludes_identity() {
        let mut person = Person::new("Ann", 30);
        person.set_id(ObjectId::new());

        let document = person.to_document().unwrap();
        assert_eq!(document, doc! { "name": "Ann", "age": 30 });
    }

    #[test]
    fn test_from_document_mismatch() {
        let err = Person::from_document(doc! { "name": "Ann", "age": "thirty" }).unwrap_err();
        assert!(matches!(err, ModelError::ArgumentMismatch(_)));
    }

    #[test]
    fn test_materialize_restores_identity() {
        let id = ObjectId::new();
        let person: Person = materialize(
            doc! { "_id": id, "name": "Ann", "age": 30 },
            IdentityPolicy::Restore,
        )
        .unwrap();

        assert_eq!(person.id, Some(id));
        assert_eq!(person.name, "Ann");
    }

    #[test]
    fn test_materialize_discards_identity() {
        let person: Person = materialize(
            doc! { "_id": ObjectId::new(), "name": "Ann", "age": 30 },
            IdentityPolicy::Discard,
        )
        .unwrap();

        assert_eq!(person.id, None);
    }

    #[test]
    fn test_materialize_requires_object_id_for_find() {
        let skipped = materialize::<Person>(
            doc! { "_id": "ann-key", "name": "Ann", "age": 30 },
            IdentityPolicy::Require,
        )
        .unwrap_err();

        assert_eq!(skipped.id, None);
        assert!(matches!(skipped.error, ModelError::ArgumentMismatch(ref m) if m.contains("ann-key")));
    }

    #[test]
    fn test_materialize_ignores_group_key_for_aggregate() {
        let person: Person = materialize(
            doc! { "_id": "group-key", "name": "Ann", "age": 30 },
            IdentityPolicy::Restore,
        )
        .unwrap();

        assert_eq!(person.id, None);
    }

    #[test]
    fn test_materialize_require_restores_object_id() {
        let id = ObjectId::new();
        let person: Person = materialize(
            doc! { "_id": id, "name": "Ann", "age": 30 },
            IdentityPolicy::Require,
        )
        .unwrap();

        assert_eq!(person.id, Some(id));
    }

    #[test]
    fn test_materialize_reports_skipped_document() {
        let id = ObjectId::new();
        let skipped = materialize::<Person>(doc! { "_id": id, "name": 1 }, IdentityPolicy::Require).unwrap_err();

        assert_eq!(skipped.id, Some(id));
        assert!(matches!(skipped.error, ModelError::ArgumentMismatch(_)));
    }
}
