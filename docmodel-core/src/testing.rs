//! Recording backend used by the unit tests of this crate.

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use futures::{StreamExt, stream};
use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    backend::{DocumentStream, StoreBackend, StoreBackendBuilder},
    error::{ModelError, ModelResult},
    query::{CountOptions, Query},
};

/// One call received by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Count(String, Document, CountOptions),
    Find(String, Query),
    Aggregate(String, Vec<Document>),
    Insert(String, Document),
    Replace(String, ObjectId, Document),
    DeleteOne(String, Document),
    DeleteMany(String, Document),
    Drop(String),
    CreateIndex(String, Document),
    DropIndex(String, String),
    DropIndexes(String),
    ListIndexes(String),
}

/// Serves a fixed set of documents and records every call.
///
/// Find applies the skip and limit of the query to the served documents; aggregate serves
/// them unchanged.
#[derive(Debug, Default)]
pub(crate) struct RecordingBackend {
    documents: Vec<Document>,
    count: u64,
    deleted: u64,
    fail_stream_after: Option<usize>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_documents(mut self, documents: Vec<Document>) -> Self {
        self.documents = documents;
        self
    }

    pub(crate) fn with_count(mut self, count: u64) -> Self {
        self.count = count;
        self
    }

    pub(crate) fn with_deleted(mut self, deleted: u64) -> Self {
        self.deleted = deleted;
        self
    }

    /// Makes every read stream fail with a backend error after `n` documents.
    pub(crate) fn with_stream_failure_after(mut self, n: usize) -> Self {
        self.fail_stream_after = Some(n);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn last_call(&self) -> Option<Call> {
        self.calls.lock().unwrap().last().cloned()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn serve(&self, documents: Vec<Document>) -> DocumentStream {
        let mut items = documents.into_iter().map(Ok).collect::<Vec<ModelResult<Document>>>();

        if let Some(n) = self.fail_stream_after {
            items.truncate(n);
            items.push(Err(ModelError::Backend("cursor killed".to_string())));
        }

        stream::iter(items).boxed()
    }
}

#[async_trait]
impl StoreBackend for RecordingBackend {
    async fn count_documents(
        &self,
        collection: &str,
        filter: Document,
        options: CountOptions,
    ) -> ModelResult<u64> {
        let count = options.apply(self.count);
        self.record(Call::Count(collection.to_string(), filter, options));
        Ok(count)
    }

    async fn find_documents(&self, collection: &str, query: Query) -> ModelResult<DocumentStream> {
        let skip = query.skip.unwrap_or(0) as usize;
        let limit = query
            .limit
            .filter(|limit| *limit > 0)
            .map_or(usize::MAX, |limit| limit as usize);
        let documents = self
            .documents
            .iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect();

        self.record(Call::Find(collection.to_string(), query));
        Ok(self.serve(documents))
    }

    async fn aggregate_documents(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
    ) -> ModelResult<DocumentStream> {
        self.record(Call::Aggregate(collection.to_string(), pipeline));
        Ok(self.serve(self.documents.clone()))
    }

    async fn insert_document(&self, collection: &str, document: Document) -> ModelResult<ObjectId> {
        self.record(Call::Insert(collection.to_string(), document));
        Ok(ObjectId::new())
    }

    async fn replace_document(
        &self,
        collection: &str,
        id: ObjectId,
        document: Document,
    ) -> ModelResult<u64> {
        self.record(Call::Replace(collection.to_string(), id, document));
        Ok(1)
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> ModelResult<u64> {
        self.record(Call::DeleteOne(collection.to_string(), filter));
        Ok(self.deleted.min(1))
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> ModelResult<u64> {
        self.record(Call::DeleteMany(collection.to_string(), filter));
        Ok(self.deleted)
    }

    async fn drop_collection(&self, collection: &str) -> ModelResult<()> {
        self.record(Call::Drop(collection.to_string()));
        Ok(())
    }

    async fn create_index(&self, collection: &str, keys: Document) -> ModelResult<String> {
        let name = keys
            .iter()
            .map(|(field, direction)| format!("{field}_{direction}"))
            .collect::<Vec<_>>()
            .join("_");

        self.record(Call::CreateIndex(collection.to_string(), keys));
        Ok(name)
    }

    async fn drop_index(&self, collection: &str, name: &str) -> ModelResult<()> {
        self.record(Call::DropIndex(collection.to_string(), name.to_string()));
        Ok(())
    }

    async fn drop_indexes(&self, collection: &str) -> ModelResult<()> {
        self.record(Call::DropIndexes(collection.to_string()));
        Ok(())
    }

    async fn list_index_names(&self, collection: &str) -> ModelResult<Vec<String>> {
        self.record(Call::ListIndexes(collection.to_string()));
        Ok(vec!["_id_".to_string()])
    }
}

/// Builder that counts how often it was asked to build.
#[derive(Debug, Clone)]
pub(crate) struct CountingBuilder {
    pub(crate) builds: std::sync::Arc<AtomicUsize>,
    pub(crate) fail: bool,
}

impl CountingBuilder {
    pub(crate) fn new(fail: bool) -> Self {
        Self { builds: Default::default(), fail }
    }

    pub(crate) fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreBackendBuilder for CountingBuilder {
    type Backend = RecordingBackend;

    async fn build(self) -> ModelResult<Self::Backend> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;

        if self.fail {
            Err(ModelError::Configuration("connection refused".to_string()))
        } else {
            Ok(RecordingBackend::new())
        }
    }
}
