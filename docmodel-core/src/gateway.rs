//! Persistence gateway: the entry point for reading and writing entities.
//!
//! A [`Gateway`] owns a store backend. [`Gateway::repository`] binds it to an entity type and
//! the collection that type is stored in, giving a [`Repository`] with the count, find,
//! aggregate, save, delete and index operations.
//!
//! Descriptors are compiled before any I/O, so a malformed descriptor or a missing value never
//! reaches the store.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::gateway::Gateway;
//! use bson::Bson;
//!
//! let gateway = Gateway::new(backend);
//! let people = gateway.repository::<Person>();
//!
//! let mut ann = Person::new("Ann", 30);
//! people.save(&mut ann).await?;
//!
//! let adults = people
//!     .find_by("byCity", &[Bson::from("Oslo")])?
//!     .order("-age")?
//!     .fetch()
//!     .await?;
//! ```

use bson::{Bson, Document, doc, oid::ObjectId};
use std::marker::PhantomData;
use tracing::debug;

use crate::{
    backend::StoreBackend,
    cursor::{AggregateCursor, FindCursor},
    descriptor::{compile_filter, compile_sort},
    entity::{Entity, EntityExt, ID_KEY},
    error::ModelResult,
    query::{CountOptions, SortSpec},
};

/// A store handle that hands out repositories.
#[derive(Debug)]
pub struct Gateway<B: StoreBackend> {
    backend: B,
}

impl<B: StoreBackend> Gateway<B> {
    /// Creates a new gateway over the given backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the backend this gateway delegates to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns a repository for `E` over the collection named by the entity type.
    pub fn repository<E: Entity>(&self) -> Repository<'_, B, E> {
        Repository::new(&self.backend, E::collection_name())
    }

    /// Returns a repository for `E` over an explicitly named collection.
    pub fn repository_in<E: Entity>(&self, collection: &str) -> Repository<'_, B, E> {
        Repository::new(&self.backend, collection)
    }

    /// Shuts the backend down, releasing its connections.
    pub async fn shutdown(self) -> ModelResult<()> {
        self.backend.shutdown().await
    }
}

/// Operations on the entities of one type stored in one collection.
#[derive(Debug)]
pub struct Repository<'a, B: StoreBackend, E: Entity> {
    backend: &'a B,
    collection: String,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, B: StoreBackend, E: Entity> Clone for Repository<'a, B, E> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend,
            collection: self.collection.clone(),
            _entity: PhantomData,
        }
    }
}

impl<'a, B: StoreBackend, E: Entity> Repository<'a, B, E> {
    pub(crate) fn new(backend: &'a B, collection: &str) -> Self {
        Self {
            backend,
            collection: collection.to_string(),
            _entity: PhantomData,
        }
    }

    /// Returns the name of the collection.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Counts all documents of the collection.
    pub async fn count(&self) -> ModelResult<u64> {
        self.count_with(Document::new(), CountOptions::default())
            .await
    }

    /// Counts the documents matching a filter descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ArgumentCount`](crate::error::ModelError::ArgumentCount) or
    /// [`ModelError::InvalidDescriptor`](crate::error::ModelError::InvalidDescriptor) without
    /// contacting the store.
    pub async fn count_by(&self, descriptor: &str, values: &[Bson]) -> ModelResult<u64> {
        let filter = compile_filter(descriptor, values)?;

        self.count_filter(filter).await
    }

    /// Counts the documents matching a structured filter.
    pub async fn count_filter(&self, filter: impl Into<Document>) -> ModelResult<u64> {
        self.count_with(filter, CountOptions::default())
            .await
    }

    /// Counts the documents matching a structured filter, narrowed by skip and limit.
    pub async fn count_with(
        &self,
        filter: impl Into<Document>,
        options: CountOptions,
    ) -> ModelResult<u64> {
        let filter = filter.into();
        debug!("Counting {} with filter {}", self.collection, filter);

        self.backend
            .count_documents(&self.collection, filter, options)
            .await
    }

    /// Opens a find cursor over the documents matching a filter descriptor.
    ///
    /// No document is transferred until the cursor is pulled.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::ArgumentCount`](crate::error::ModelError::ArgumentCount) or
    /// [`ModelError::InvalidDescriptor`](crate::error::ModelError::InvalidDescriptor).
    pub fn find_by(&self, descriptor: &str, values: &[Bson]) -> ModelResult<FindCursor<'a, B, E>> {
        let filter = compile_filter(descriptor, values)?;

        Ok(self.find(filter, None))
    }

    /// Opens a find cursor over every document of the collection.
    pub fn find_all(&self) -> FindCursor<'a, B, E> {
        self.find(Document::new(), None)
    }

    /// Opens a find cursor over a structured filter with an optional order.
    pub fn find(&self, filter: impl Into<Document>, sort: Option<SortSpec>) -> FindCursor<'a, B, E> {
        let filter = filter.into();
        debug!("Finding in {} with filter {}", self.collection, filter);

        let cursor = FindCursor::new(self.backend, self.collection.as_str(), filter);
        match sort {
            Some(sort) => cursor.sort(sort),
            None => cursor,
        }
    }

    /// Opens a cursor over the output of an aggregation pipeline.
    pub fn aggregate(&self, pipeline: Vec<Document>) -> AggregateCursor<'a, B, E> {
        debug!("Aggregating {} with {} stage(s)", self.collection, pipeline.len());

        AggregateCursor::new(self.backend, self.collection.as_str(), pipeline)
    }

    /// Persists an entity and returns its identity.
    ///
    /// An entity without identity is inserted and receives the identity generated by the
    /// store. An entity with identity fully replaces the stored document: fields that are
    /// absent from the entity disappear from the store.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::Serialization`](crate::error::ModelError::Serialization) if the
    /// entity cannot be mapped, or the store error.
    pub async fn save(&self, entity: &mut E) -> ModelResult<ObjectId> {
        let document = entity.to_document()?;

        match entity.id() {
            None => {
                let id = self
                    .backend
                    .insert_document(&self.collection, document)
                    .await?;
                debug!("Inserted {} into {}", id, self.collection);

                entity.set_id(id);
                Ok(id)
            }
            Some(id) => {
                let matched = self
                    .backend
                    .replace_document(&self.collection, id, document)
                    .await?;
                debug!("Replaced {} in {} ({} matched)", id, self.collection, matched);

                Ok(id)
            }
        }
    }

    /// Deletes an entity by identity and returns the number of documents removed.
    ///
    /// An entity that was never saved, or that is already gone from the store, removes
    /// nothing and is not an error.
    pub async fn delete(&self, entity: &E) -> ModelResult<u64> {
        let Some(id) = entity.id() else {
            return Ok(0);
        };

        debug!("Deleting {} from {}", id, self.collection);
        self.backend
            .delete_one(&self.collection, doc! { ID_KEY: id })
            .await
    }

    /// Deletes every document matching a filter descriptor.
    ///
    /// Returns the number of matching documents counted just before the delete. A concurrent
    /// writer can make it differ from the number actually removed.
    pub async fn delete_by(&self, descriptor: &str, values: &[Bson]) -> ModelResult<u64> {
        let filter = compile_filter(descriptor, values)?.into_document();

        let count = self
            .backend
            .count_documents(&self.collection, filter.clone(), CountOptions::default())
            .await?;
        debug!("Deleting {} document(s) from {} with filter {}", count, self.collection, filter);

        self.backend
            .delete_many(&self.collection, filter)
            .await?;

        Ok(count)
    }

    /// Drops the collection and returns the number of documents it held.
    ///
    /// Indexes are dropped together with the collection.
    pub async fn delete_all(&self) -> ModelResult<u64> {
        let count = self.count().await?;
        debug!("Dropping {} with {} document(s)", self.collection, count);

        self.backend
            .drop_collection(&self.collection)
            .await?;

        Ok(count)
    }

    /// Creates an index from an order descriptor such as `"-age, name"` and returns its name.
    pub async fn index(&self, order: &str) -> ModelResult<String> {
        let keys = compile_sort(order)?;

        self.backend
            .create_index(&self.collection, keys.to_document())
            .await
    }

    /// Drops the index that [`index`](Self::index) creates for the same order descriptor.
    pub async fn drop_index(&self, order: &str) -> ModelResult<()> {
        let name = compile_sort(order)?.index_name();

        self.backend
            .drop_index(&self.collection, &name)
            .await
    }

    /// Drops every index of the collection except the identity index.
    pub async fn drop_indexes(&self) -> ModelResult<()> {
        self.backend
            .drop_indexes(&self.collection)
            .await
    }

    /// Lists the names of the indexes of the collection.
    pub async fn list_index_names(&self) -> ModelResult<Vec<String>> {
        self.backend
            .list_index_names(&self.collection)
            .await
    }
}
