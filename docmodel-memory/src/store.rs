//! In-memory storage implementation for document stores.
//!
//! Collections are kept in insertion order behind an async-aware read-write lock. Every
//! document carries its identity under `_id`, and every collection has the implicit `_id_`
//! index in addition to the indexes created on it.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use bson::{Bson, Document, oid::ObjectId};
use tracing::debug;

use docmodel_core::{
    backend::{DocumentStream, StoreBackend, StoreBackendBuilder},
    entity::ID_KEY,
    error::{ModelError, ModelResult},
    query::{CountOptions, Query},
};

use crate::{
    evaluator::{DocumentEvaluator, compare_documents},
    pipeline,
};

/// Name of the index every collection has on `_id`.
pub const ID_INDEX: &str = "_id_";

#[derive(Debug, Default, Clone)]
struct CollectionData {
    documents: Vec<Document>,
    /// Secondary indexes as `(name, keys)`, in creation order.
    indexes: Vec<(String, Document)>,
}

impl CollectionData {
    fn matching(&self, filter: &Document) -> ModelResult<Vec<Document>> {
        DocumentEvaluator::filter_documents(&self.documents, filter)
    }

    fn position(&self, filter: &Document) -> ModelResult<Option<usize>> {
        for (index, document) in self.documents.iter().enumerate() {
            if DocumentEvaluator::new(document).evaluate(filter)? {
                return Ok(Some(index));
            }
        }

        Ok(None)
    }
}

type StoreMap = HashMap<String, CollectionData>;

/// Thread-safe in-memory document storage backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing it to be
/// safely shared across async tasks. Multiple clones of the same instance share the same
/// underlying data.
///
/// Queries scan all documents of a collection; indexes are recorded but not used for lookups.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// let id = store.insert_document("person", doc! { "name": "Ann" }).await?;
/// assert_eq!(store.count_documents("person", doc! {}, Default::default()).await?, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents and indexes
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Names of the collections currently holding data or indexes.
    pub async fn collection_names(&self) -> Vec<String> {
        let mut names = self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        names.sort();

        names
    }
}

/// Builds the default name the store gives an index over `keys`, e.g. `age_-1_name_1`.
pub fn index_name(keys: &Document) -> String {
    keys.iter()
        .map(|(field, direction)| match direction {
            Bson::Double(d) if d.fract() == 0.0 => format!("{field}_{}", *d as i64),
            other => format!("{field}_{other}"),
        })
        .collect::<Vec<_>>()
        .join("_")
}

fn with_identity(id: ObjectId, document: Document) -> Document {
    let mut stored = Document::new();
    stored.insert(ID_KEY, id);
    stored.extend(document);

    stored
}

fn into_stream(documents: Vec<Document>) -> DocumentStream {
    stream::iter(documents.into_iter().map(Ok)).boxed()
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn count_documents(
        &self,
        collection: &str,
        filter: Document,
        options: CountOptions,
    ) -> ModelResult<u64> {
        let store = self.store.read().await;
        let matched = match store.get(collection) {
            Some(data) => data.matching(&filter)?.len() as u64,
            None => 0,
        };

        Ok(options.apply(matched))
    }

    async fn find_documents(&self, collection: &str, query: Query) -> ModelResult<DocumentStream> {
        let mut documents = {
            let store = self.store.read().await;
            match store.get(collection) {
                Some(data) => data.matching(&query.filter)?,
                None => Vec::new(),
            }
        };

        if let Some(sort) = &query.sort {
            documents.sort_by(|a, b| compare_documents(a, b, sort));
        }

        let skip = query.skip.unwrap_or(0) as usize;
        let limit = match query.limit {
            Some(limit) if limit > 0 => limit as usize,
            _ => usize::MAX,
        };

        Ok(into_stream(
            documents
                .into_iter()
                .skip(skip)
                .take(limit)
                .collect(),
        ))
    }

    async fn aggregate_documents(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> ModelResult<DocumentStream> {
        let documents = self
            .store
            .read()
            .await
            .get(collection)
            .map(|data| data.documents.clone())
            .unwrap_or_default();

        Ok(into_stream(pipeline::run(documents, &pipeline)?))
    }

    async fn insert_document(&self, collection: &str, mut document: Document) -> ModelResult<ObjectId> {
        let id = match document.remove(ID_KEY) {
            Some(Bson::ObjectId(id)) => id,
            Some(other) => {
                return Err(ModelError::InvalidDocument(format!(
                    "_id must be an ObjectId, got {other}"
                )));
            }
            None => ObjectId::new(),
        };

        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();

        if data
            .documents
            .iter()
            .any(|existing| existing.get_object_id(ID_KEY).ok() == Some(id))
        {
            return Err(ModelError::DocumentAlreadyExists(id.to_hex(), collection.to_string()));
        }

        data.documents.push(with_identity(id, document));
        debug!("Inserted {} into {}", id, collection);

        Ok(id)
    }

    async fn replace_document(
        &self,
        collection: &str,
        id: ObjectId,
        mut document: Document,
    ) -> ModelResult<u64> {
        document.remove(ID_KEY);

        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(0);
        };

        match data
            .documents
            .iter_mut()
            .find(|existing| existing.get_object_id(ID_KEY).ok() == Some(id))
        {
            Some(existing) => {
                *existing = with_identity(id, document);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> ModelResult<u64> {
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(0);
        };

        match data.position(&filter)? {
            Some(index) => {
                data.documents.remove(index);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> ModelResult<u64> {
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(0);
        };

        let matches = data
            .documents
            .iter()
            .map(|document| DocumentEvaluator::new(document).evaluate(&filter))
            .collect::<ModelResult<Vec<_>>>()?;

        let deleted = matches.iter().filter(|matched| **matched).count();
        let mut matches = matches.into_iter();
        data.documents.retain(|_| !matches.next().unwrap_or(false));

        Ok(deleted as u64)
    }

    async fn drop_collection(&self, collection: &str) -> ModelResult<()> {
        if self.store.write().await.remove(collection).is_some() {
            debug!("Dropped {}", collection);
        }

        Ok(())
    }

    async fn create_index(&self, collection: &str, keys: Document) -> ModelResult<String> {
        if keys.is_empty() {
            return Err(ModelError::Backend("index keys cannot be empty".to_string()));
        }

        let name = index_name(&keys);
        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();

        match data.indexes.iter().find(|(existing, _)| *existing == name) {
            Some((_, existing_keys)) if *existing_keys != keys => Err(ModelError::Backend(format!(
                "an index named {name} already exists with different keys"
            ))),
            Some(_) => Ok(name),
            None => {
                data.indexes.push((name.clone(), keys));
                Ok(name)
            }
        }
    }

    async fn drop_index(&self, collection: &str, name: &str) -> ModelResult<()> {
        if name == ID_INDEX {
            return Err(ModelError::Backend("cannot drop _id index".to_string()));
        }

        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Err(ModelError::Backend(format!("ns not found: {collection}")));
        };

        let before = data.indexes.len();
        data.indexes.retain(|(existing, _)| existing != name);

        if data.indexes.len() == before {
            return Err(ModelError::Backend(format!("index not found with name [{name}]")));
        }

        Ok(())
    }

    async fn drop_indexes(&self, collection: &str) -> ModelResult<()> {
        if let Some(data) = self.store.write().await.get_mut(collection) {
            data.indexes.clear();
        }

        Ok(())
    }

    async fn list_index_names(&self, collection: &str) -> ModelResult<Vec<String>> {
        let store = self.store.read().await;

        Ok(match store.get(collection) {
            Some(data) => std::iter::once(ID_INDEX.to_string())
                .chain(data.indexes.iter().map(|(name, _)| name.clone()))
                .collect(),
            None => Vec::new(),
        })
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// Building always succeeds and returns a fresh, empty store.
///
/// # Example
///
/// ```ignore
/// use docmodel_memory::InMemoryStore;
/// use docmodel::backend::StoreBackendBuilder;
///
/// let store = InMemoryStore::builder().build().await?;
/// ```
#[derive(Debug, Default, Clone)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> ModelResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use futures::TryStreamExt;

    async fn collect(stream: DocumentStream) -> Vec<Document> {
        stream.try_collect().await.unwrap()
    }

    async fn seeded() -> (InMemoryStore, Vec<ObjectId>) {
        let store = InMemoryStore::new();
        let mut ids = Vec::new();

        for (name, age, city) in [("Ann", 30, "Oslo"), ("Bob", 40, "Bergen"), ("Cid", 20, "Oslo")] {
            ids.push(
                store
                    .insert_document("person", doc! { "name": name, "age": age, "city": city })
                    .await
                    .unwrap(),
            );
        }

        (store, ids)
    }

    fn names(documents: &[Document]) -> Vec<&str> {
        documents
            .iter()
            .map(|d| d.get_str("name").unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_insert_assigns_identity_first() {
        let store = InMemoryStore::new();
        let id = store
            .insert_document("person", doc! { "name": "Ann" })
            .await
            .unwrap();

        let documents = collect(store.find_documents("person", Query::default()).await.unwrap()).await;
        assert_eq!(documents, vec![doc! { "_id": id, "name": "Ann" }]);
        assert_eq!(documents[0].keys().next().map(String::as_str), Some("_id"));
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_identity() {
        let store = InMemoryStore::new();
        let id = ObjectId::new();

        store.insert_document("person", doc! { "_id": id }).await.unwrap();
        let err = store.insert_document("person", doc! { "_id": id }).await.unwrap_err();

        assert!(matches!(err, ModelError::DocumentAlreadyExists(..)));
    }

    #[tokio::test]
    async fn test_find_filters_sorts_and_pages() {
        let (store, _) = seeded().await;

        let mut query = Query::new(doc! { "city": "Oslo" });
        let oslo = collect(store.find_documents("person", query.clone()).await.unwrap()).await;
        assert_eq!(names(&oslo), vec!["Ann", "Cid"]);

        query.filter = Document::new();
        query.sort = Some(docmodel_core::descriptor::compile_sort("-age").unwrap());
        query.skip = Some(1);
        query.limit = Some(1);
        let page = collect(store.find_documents("person", query).await.unwrap()).await;
        assert_eq!(names(&page), vec!["Ann"]);
    }

    #[tokio::test]
    async fn test_missing_collection_reads_as_empty() {
        let store = InMemoryStore::new();

        assert_eq!(store.count_documents("nope", doc! {}, CountOptions::new()).await.unwrap(), 0);
        assert!(collect(store.find_documents("nope", Query::default()).await.unwrap()).await.is_empty());
        assert!(store.list_index_names("nope").await.unwrap().is_empty());
        assert_eq!(store.delete_many("nope", doc! {}).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_count_with_options() {
        let (store, _) = seeded().await;

        let count = store
            .count_documents("person", doc! {}, CountOptions::new().with_skip(1).with_limit(1))
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(
            store.count_documents("person", doc! { "city": "Oslo" }, CountOptions::new()).await.unwrap(),
            2
        );
    }

    #[tokio::test]
    async fn test_replace_is_a_full_replace() {
        let (store, ids) = seeded().await;

        let matched = store
            .replace_document("person", ids[0], doc! { "name": "Ann" })
            .await
            .unwrap();
        assert_eq!(matched, 1);

        let ann = collect(
            store
                .find_documents("person", Query::new(doc! { "_id": ids[0] }))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(ann, vec![doc! { "_id": ids[0], "name": "Ann" }]);

        let missing = store
            .replace_document("person", ObjectId::new(), doc! { "name": "Zed" })
            .await
            .unwrap();
        assert_eq!(missing, 0);
    }

    #[tokio::test]
    async fn test_delete_one_and_many() {
        let (store, ids) = seeded().await;

        assert_eq!(store.delete_one("person", doc! { "_id": ids[1] }).await.unwrap(), 1);
        assert_eq!(store.delete_one("person", doc! { "_id": ids[1] }).await.unwrap(), 0);
        assert_eq!(store.delete_many("person", doc! { "city": "Oslo" }).await.unwrap(), 2);
        assert_eq!(store.count_documents("person", doc! {}, CountOptions::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_aggregate() {
        let (store, _) = seeded().await;

        let output = collect(
            store
                .aggregate_documents(
                    "person",
                    vec![
                        doc! { "$group": { "_id": "$city", "n": { "$sum": 1 } } },
                        doc! { "$sort": { "n": -1 } },
                    ],
                )
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(output, vec![doc! { "_id": "Oslo", "n": 2 }, doc! { "_id": "Bergen", "n": 1 }]);
    }

    #[tokio::test]
    async fn test_index_lifecycle() {
        let (store, _) = seeded().await;

        let name = store
            .create_index("person", doc! { "age": -1, "name": 1 })
            .await
            .unwrap();
        assert_eq!(name, "age_-1_name_1");
        assert_eq!(
            store.create_index("person", doc! { "age": -1, "name": 1 }).await.unwrap(),
            name
        );
        store.create_index("person", doc! { "city": 1 }).await.unwrap();

        assert_eq!(
            store.list_index_names("person").await.unwrap(),
            vec!["_id_", "age_-1_name_1", "city_1"]
        );

        store.drop_index("person", "city_1").await.unwrap();
        assert!(store.drop_index("person", "city_1").await.is_err());
        assert!(store.drop_index("person", ID_INDEX).await.is_err());

        store.drop_indexes("person").await.unwrap();
        assert_eq!(store.list_index_names("person").await.unwrap(), vec!["_id_"]);
    }

    #[tokio::test]
    async fn test_drop_collection_removes_documents_and_indexes() {
        let (store, _) = seeded().await;
        store.create_index("person", doc! { "age": 1 }).await.unwrap();

        store.drop_collection("person").await.unwrap();
        store.drop_collection("person").await.unwrap();

        assert_eq!(store.count_documents("person", doc! {}, CountOptions::new()).await.unwrap(), 0);
        assert!(store.list_index_names("person").await.unwrap().is_empty());
        assert!(store.collection_names().await.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = InMemoryStore::builder().build().await.unwrap();
        let clone = store.clone();

        clone.insert_document("person", doc! { "name": "Ann" }).await.unwrap();

        assert_eq!(store.collection_names().await, vec!["person"]);
    }

    #[test]
    fn test_index_name() {
        assert_eq!(index_name(&doc! { "age": -1, "name": 1 }), "age_-1_name_1");
        assert_eq!(index_name(&doc! { "score": 1.0 }), "score_1");
    }
}
