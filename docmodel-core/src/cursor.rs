//! Cursors over query and aggregation results.
//!
//! A cursor is a one-shot handle on a server-side result. It is created pending: mutators
//! such as [`FindCursor::skip`] and [`FindCursor::sort`] take the cursor by value and return
//! it, and every pulling operation ([`stream`](FindCursor::stream),
//! [`fetch`](FindCursor::fetch), [`first`](FindCursor::first), ...) consumes it. Mutating a
//! cursor after documents were pulled is therefore impossible, and a cursor can never be
//! restarted.
//!
//! Every document has its `_id` stripped before the remainder is mapped into the entity:
//!
//! | operation                  | identity                                 |
//! |----------------------------|------------------------------------------|
//! | [`FindCursor`], any pull   | assigned; not an ObjectId skips the doc  |
//! | [`AggregateCursor::fetch`] | discarded                                |
//! | [`AggregateCursor::first`] | assigned when it is an ObjectId          |
//!
//! A document that does not fit the entity is logged and left out; it is reported in
//! [`Fetched::skipped`] instead of failing the whole read.

use bson::Document;
use futures::{Stream, StreamExt, ready};
use std::{
    marker::PhantomData,
    pin::Pin,
    task::{Context, Poll},
};
use tracing::warn;

use crate::{
    backend::{DocumentStream, StoreBackend},
    descriptor::compile_sort,
    entity::{Entity, IdentityPolicy, SkippedDocument, materialize},
    error::{ModelError, ModelResult},
    page::PaginationParams,
    query::{Query, SortSpec},
};

/// A pending find over one collection.
///
/// # Example
///
/// ```ignore
/// let people = gateway
///     .repository::<Person>()
///     .find_all()
///     .order("-age, name")?
///     .fetch_page(2, 10)
///     .await?;
/// ```
#[derive(Debug)]
#[must_use = "a cursor does nothing until it is fetched"]
pub struct FindCursor<'a, B: StoreBackend, E: Entity> {
    backend: &'a B,
    collection: String,
    query: Query,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, B: StoreBackend, E: Entity> FindCursor<'a, B, E> {
    pub(crate) fn new(backend: &'a B, collection: impl Into<String>, filter: Document) -> Self {
        Self {
            backend,
            collection: collection.into(),
            query: Query::new(filter),
            _entity: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The query that will be sent when the cursor is pulled.
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Skips the first `n` matching documents.
    pub fn skip(mut self, n: u64) -> Self {
        self.query.skip = Some(n);
        self
    }

    /// Returns at most `n` documents. A limit of `0` means no limit.
    pub fn limit(mut self, n: u64) -> Self {
        self.query.limit = (n != 0).then_some(n);
        self
    }

    /// Orders the results, replacing any earlier order.
    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.query.sort = Some(sort);
        self
    }

    /// Orders the results by an order descriptor such as `"-age, name"`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidDescriptor`] if the descriptor cannot be parsed.
    pub fn order(self, descriptor: &str) -> ModelResult<Self> {
        Ok(self.sort(compile_sort(descriptor)?))
    }

    /// Sends the query and returns a lazy stream of entities.
    pub async fn stream(self) -> ModelResult<EntityStream<E>> {
        let documents = self
            .backend
            .find_documents(&self.collection, self.query)
            .await?;

        Ok(EntityStream::new(documents, self.collection, IdentityPolicy::Require))
    }

    /// Materializes every remaining document.
    ///
    /// Skip and limit set earlier are kept.
    pub async fn fetch(self) -> ModelResult<Fetched<E>> {
        self.stream().await?.into_fetched().await
    }

    /// Materializes at most `n` documents from the start of the result.
    pub async fn fetch_limit(self, n: u64) -> ModelResult<Fetched<E>> {
        self.fetch_page(1, n).await
    }

    /// Materializes one page of the result.
    ///
    /// Pages are 1-indexed: page `0` and page `1` both start at the first document. A
    /// `page_size` of `0` returns everything from the page start.
    pub async fn fetch_page(self, page: u64, page_size: u64) -> ModelResult<Fetched<E>> {
        self.paginate(PaginationParams::new(page, page_size))
            .fetch()
            .await
    }

    /// Returns the first entity of the result.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if the result is empty or its first document does
    /// not fit the entity.
    pub async fn first(self) -> ModelResult<E> {
        let collection = self.collection.clone();
        let mut stream = self.limit(1).stream().await?;

        match stream.next().await {
            Some(entity) => entity,
            None => Err(ModelError::NotFound(collection)),
        }
    }

    fn paginate(mut self, params: PaginationParams) -> Self {
        if let Some(limit) = params.limit() {
            self.query.limit = Some(limit);
        }
        if let Some(skip) = params.skip() {
            self.query.skip = Some(skip);
        }

        self
    }
}

/// A pending aggregation pipeline over one collection.
///
/// Aggregation results are read-only: there is no skip, limit or sort; express those as
/// pipeline stages instead.
#[derive(Debug)]
#[must_use = "a cursor does nothing until it is fetched"]
pub struct AggregateCursor<'a, B: StoreBackend, E: Entity> {
    backend: &'a B,
    collection: String,
    pipeline: Vec<Document>,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, B: StoreBackend, E: Entity> AggregateCursor<'a, B, E> {
    pub(crate) fn new(backend: &'a B, collection: impl Into<String>, pipeline: Vec<Document>) -> Self {
        Self {
            backend,
            collection: collection.into(),
            pipeline,
            _entity: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn pipeline(&self) -> &[Document] {
        &self.pipeline
    }

    /// Runs the pipeline and returns a lazy stream of entities without identities.
    pub async fn stream(self) -> ModelResult<EntityStream<E>> {
        self.open(IdentityPolicy::Discard).await
    }

    /// Materializes every output document. The `_id` of each document is discarded.
    pub async fn fetch(self) -> ModelResult<Fetched<E>> {
        self.stream().await?.into_fetched().await
    }

    /// Returns the first output entity with its `_id` assigned when it is an ObjectId.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotFound`] if no output document fits the entity.
    pub async fn first(self) -> ModelResult<E> {
        let collection = self.collection.clone();
        let mut stream = self.open(IdentityPolicy::Restore).await?;

        match stream.next().await {
            Some(entity) => entity,
            None => Err(ModelError::NotFound(collection)),
        }
    }

    async fn open(self, policy: IdentityPolicy) -> ModelResult<EntityStream<E>> {
        let documents = self
            .backend
            .aggregate_documents(&self.collection, self.pipeline)
            .await?;

        Ok(EntityStream::new(documents, self.collection, policy))
    }
}

/// A lazy stream of entities read from an open cursor.
///
/// Documents that do not fit the entity are logged, recorded and skipped; store errors are
/// yielded as `Err` items.
pub struct EntityStream<E: Entity> {
    documents: DocumentStream,
    collection: String,
    policy: IdentityPolicy,
    skipped: Vec<SkippedDocument>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> EntityStream<E> {
    fn new(documents: DocumentStream, collection: String, policy: IdentityPolicy) -> Self {
        Self {
            documents,
            collection,
            policy,
            skipped: Vec::new(),
            _entity: PhantomData,
        }
    }

    /// Documents skipped so far.
    pub fn skipped(&self) -> &[SkippedDocument] {
        &self.skipped
    }

    /// Drains the stream.
    ///
    /// # Errors
    ///
    /// Returns the first store error raised while reading; entities read before it are lost.
    pub async fn into_fetched(mut self) -> ModelResult<Fetched<E>> {
        let mut entities = Vec::new();
        while let Some(entity) = self.next().await {
            entities.push(entity?);
        }

        Ok(Fetched {
            entities,
            skipped: self.skipped,
        })
    }

    fn skip_document(&mut self, skipped: SkippedDocument) {
        warn!(
            "Skipping document {:?} in collection {}: {}",
            skipped.id, self.collection, skipped.error
        );
        self.skipped.push(skipped);
    }
}

impl<E: Entity> Stream for EntityStream<E> {
    type Item = ModelResult<E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(self.documents.poll_next_unpin(cx)) {
                Some(Ok(document)) => match materialize::<E>(document, self.policy) {
                    Ok(entity) => return Poll::Ready(Some(Ok(entity))),
                    Err(skipped) => self.skip_document(skipped),
                },
                Some(Err(err)) => return Poll::Ready(Some(Err(err))),
                None => return Poll::Ready(None),
            }
        }
    }
}

impl<E: Entity> std::fmt::Debug for EntityStream<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStream")
            .field("collection", &self.collection)
            .field("policy", &self.policy)
            .field("skipped", &self.skipped.len())
            .finish()
    }
}

/// The entities read by a fetch, in result order, plus the documents that were skipped.
#[derive(Debug)]
pub struct Fetched<E> {
    entities: Vec<E>,
    skipped: Vec<SkippedDocument>,
}

impl<E> Fetched<E> {
    pub fn entities(&self) -> &[E] {
        &self.entities
    }

    pub fn skipped(&self) -> &[SkippedDocument] {
        &self.skipped
    }

    pub fn into_entities(self) -> Vec<E> {
        self.entities
    }

    pub fn into_parts(self) -> (Vec<E>, Vec<SkippedDocument>) {
        (self.entities, self.skipped)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, E> {
        self.entities.iter()
    }
}

impl<E> IntoIterator for Fetched<E> {
    type Item = E;
    type IntoIter = std::vec::IntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}

impl<'f, E> IntoIterator for &'f Fetched<E> {
    type Item = &'f E;
    type IntoIter = std::slice::Iter<'f, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.iter()
    }
}
