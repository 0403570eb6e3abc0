//! Storage backend abstraction for the document store.
//!
//! This module defines the traits that abstract over the store driver, so that the gateway and
//! the cursors work the same against the in-memory backend and against a MongoDB deployment.
//!
//! # Overview
//!
//! The [`StoreBackend`] trait provides a unified async interface for the store operations the
//! data-access layer consumes: counting, finding, aggregating, single document writes, bulk
//! deletes and index administration. Implementations are required to be thread-safe
//! (`Send + Sync`) and support concurrent access.
//!
//! Reads return a [`DocumentStream`]: the backend hands over a lazy, server-side result
//! stream and the cursor engine pulls from it.
//!
//! # Traits
//!
//! - [`StoreBackend`]: The core trait for storage backends
//! - [`StoreBackendBuilder`]: Factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docmodel::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! let id = backend.insert_document("person", doc! { "name": "Ann", "age": 30 }).await?;
//! let count = backend.count_documents("person", doc! {}, Default::default()).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use futures::stream::BoxStream;
use std::fmt::Debug;

use crate::{
    error::ModelResult,
    query::{CountOptions, Query},
};

/// A lazy stream of raw documents produced by a backend read.
///
/// Each item is either a document or the store error that interrupted the stream.
pub type DocumentStream = BoxStream<'static, ModelResult<Document>>;

/// Abstract interface for document storage backends.
///
/// Every operation is keyed by a collection name. A collection that does not exist behaves as
/// an empty one for reads and is created implicitly by the first insert.
///
/// # Thread Safety
///
/// All implementations must be thread-safe and support concurrent access from multiple async
/// tasks. The concurrency model is implementation-specific.
///
/// # Error Handling
///
/// Store failures are reported as [`ModelError::Backend`](crate::error::ModelError::Backend)
/// and are never retried by the callers in this crate.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Counts the documents matching a filter, narrowed by skip and limit.
    ///
    /// A zero limit means no limit.
    async fn count_documents(
        &self,
        collection: &str,
        filter: Document,
        options: CountOptions,
    ) -> ModelResult<u64>;

    /// Opens a stream over the documents matching a query.
    ///
    /// Skip, limit and sort of the query are applied by the store before the first document
    /// is produced. Without a sort, documents come in natural (insertion) order.
    async fn find_documents(&self, collection: &str, query: Query) -> ModelResult<DocumentStream>;

    /// Runs an aggregation pipeline and opens a stream over its output.
    async fn aggregate_documents(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> ModelResult<DocumentStream>;

    /// Inserts one document and returns the identity generated for it.
    ///
    /// The document must not carry an `_id`.
    async fn insert_document(&self, collection: &str, document: Document) -> ModelResult<ObjectId>;

    /// Replaces the whole document stored under an identity.
    ///
    /// Returns the number of documents matched, which is `0` when no document has that
    /// identity. Fields absent from `document` disappear from the stored document.
    async fn replace_document(
        &self,
        collection: &str,
        id: ObjectId,
        document: Document,
    ) -> ModelResult<u64>;

    /// Deletes the first document matching a filter and returns the number deleted.
    async fn delete_one(&self, collection: &str, filter: Document) -> ModelResult<u64>;

    /// Deletes every document matching a filter and returns the number deleted.
    async fn delete_many(&self, collection: &str, filter: Document) -> ModelResult<u64>;

    /// Drops a collection together with its documents and indexes.
    ///
    /// Dropping a collection that does not exist is not an error.
    async fn drop_collection(&self, collection: &str) -> ModelResult<()>;

    /// Creates an index over `keys` (`{field: 1 | -1}`) and returns its name.
    async fn create_index(&self, collection: &str, keys: Document) -> ModelResult<String>;

    /// Drops the index with the given name.
    async fn drop_index(&self, collection: &str, name: &str) -> ModelResult<()>;

    /// Drops every index of a collection except the identity index.
    async fn drop_indexes(&self, collection: &str) -> ModelResult<()>;

    /// Lists the names of the indexes of a collection.
    ///
    /// A collection that does not exist has no indexes.
    async fn list_index_names(&self, collection: &str) -> ModelResult<Vec<String>>;

    /// Cleanly shuts down the backend, releasing all resources.
    ///
    /// The default implementation is a no-op; backends holding connections should override it.
    async fn shutdown(self) -> ModelResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn count_documents(
        &self,
        collection: &str,
        filter: Document,
        options: CountOptions,
    ) -> ModelResult<u64> {
        (*self)
            .count_documents(collection, filter, options)
            .await
    }

    async fn find_documents(&self, collection: &str, query: Query) -> ModelResult<DocumentStream> {
        (*self)
            .find_documents(collection, query)
            .await
    }

    async fn aggregate_documents(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> ModelResult<DocumentStream> {
        (*self)
            .aggregate_documents(collection, pipeline)
            .await
    }

    async fn insert_document(&self, collection: &str, document: Document) -> ModelResult<ObjectId> {
        (*self)
            .insert_document(collection, document)
            .await
    }

    async fn replace_document(
        &self,
        collection: &str,
        id: ObjectId,
        document: Document,
    ) -> ModelResult<u64> {
        (*self)
            .replace_document(collection, id, document)
            .await
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> ModelResult<u64> {
        (*self).delete_one(collection, filter).await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> ModelResult<u64> {
        (*self).delete_many(collection, filter).await
    }

    async fn drop_collection(&self, collection: &str) -> ModelResult<()> {
        (*self).drop_collection(collection).await
    }

    async fn create_index(&self, collection: &str, keys: Document) -> ModelResult<String> {
        (*self).create_index(collection, keys).await
    }

    async fn drop_index(&self, collection: &str, name: &str) -> ModelResult<()> {
        (*self).drop_index(collection, name).await
    }

    async fn drop_indexes(&self, collection: &str) -> ModelResult<()> {
        (*self).drop_indexes(collection).await
    }

    async fn list_index_names(&self, collection: &str) -> ModelResult<Vec<String>> {
        (*self).list_index_names(collection).await
    }
}

/// Factory trait for creating backend instances.
///
/// A builder carries everything needed to open a store handle; building may contact the store
/// and fails with [`ModelError::Configuration`](crate::error::ModelError::Configuration) when
/// it is unreachable or rejects the credentials.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> ModelResult<Self::Backend>;
}
