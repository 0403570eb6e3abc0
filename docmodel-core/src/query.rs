//! Structured filter, sort and query types.
//!
//! These are the intermediate representations produced by the
//! [`descriptor`](crate::descriptor) compiler and consumed by every
//! [`StoreBackend`](crate::backend::StoreBackend):
//!
//! - [`FilterSpec`] - ordered conjunction of `field == value` constraints
//! - [`SortSpec`] - ordered list of `(field, direction)` pairs
//! - [`Query`] - a filter plus the pending skip/limit/sort of a find cursor
//! - [`CountOptions`] - skip/limit applied to a count
//!
//! # Example
//!
//! ```ignore
//! use docmodel::query::{FilterSpec, SortDirection, SortSpec};
//!
//! let mut filter = FilterSpec::new();
//! filter.insert("name", "Ann");
//!
//! let mut sort = SortSpec::new();
//! sort.push("age", SortDirection::Desc);
//! assert_eq!(sort.to_document(), bson::doc! { "age": -1 });
//! ```

use bson::{Bson, Document};

/// Sort direction for query results and index keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order, stored as `1`.
    Asc,
    /// Descending order, stored as `-1`.
    Desc,
}

impl SortDirection {
    /// Returns the numeric form used by the store (`1` or `-1`).
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// An ordered mapping from field name to sort direction.
///
/// Field order is significant: the first entry is the primary sort key. Pushing a field that is
/// already present replaces its direction in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<Sort>,
}

impl SortSpec {
    /// Creates an empty sort specification.
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Appends a sort key, or replaces the direction of an existing one.
    pub fn push(&mut self, field: impl Into<String>, direction: SortDirection) {
        let field = field.into();

        match self.keys.iter_mut().find(|sort| sort.field == field) {
            Some(existing) => existing.direction = direction,
            None => self.keys.push(Sort { field, direction }),
        }
    }

    /// Returns the direction bound to a field, if any.
    pub fn get(&self, field: &str) -> Option<SortDirection> {
        self.keys
            .iter()
            .find(|sort| sort.field == field)
            .map(|sort| sort.direction)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sort> {
        self.keys.iter()
    }

    /// Converts the specification into the store's `{field: 1 | -1}` form.
    pub fn to_document(&self) -> Document {
        self.keys
            .iter()
            .map(|sort| (sort.field.clone(), Bson::Int32(sort.direction.as_i32())))
            .collect()
    }

    /// Returns the default index name the store derives from these keys.
    ///
    /// ```ignore
    /// // "-age,name" -> "age_-1_name_1"
    /// ```
    pub fn index_name(&self) -> String {
        self.keys
            .iter()
            .map(|sort| format!("{}_{}", sort.field, sort.direction.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl From<SortSpec> for Document {
    fn from(spec: SortSpec) -> Self {
        spec.to_document()
    }
}

/// An ordered conjunction of equality constraints.
///
/// An empty filter matches every document. Inserting a field twice keeps its original position
/// and the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    document: Document,
}

impl FilterSpec {
    /// Creates an empty filter that matches all documents.
    pub fn new() -> Self {
        Self { document: Document::new() }
    }

    /// Binds a field to an expected value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Bson>) {
        self.document.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Bson> {
        self.document.get(field)
    }

    pub fn len(&self) -> usize {
        self.document.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    /// Iterates over `(field, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Bson)> {
        self.document.iter()
    }

    pub fn as_document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

impl From<FilterSpec> for Document {
    fn from(spec: FilterSpec) -> Self {
        spec.document
    }
}

impl From<Document> for FilterSpec {
    fn from(document: Document) -> Self {
        Self { document }
    }
}

/// A find query as handed to a backend.
///
/// The filter is a store-native document: either a compiled [`FilterSpec`] or any structured
/// filter the backend understands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Filter document; empty matches all documents.
    pub filter: Document,
    /// Number of documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
    /// Sort specification for results.
    pub sort: Option<SortSpec>,
}

impl Query {
    /// Creates a query with the given filter and no skip, limit or sort.
    pub fn new(filter: impl Into<Document>) -> Self {
        Self {
            filter: filter.into(),
            skip: None,
            limit: None,
            sort: None,
        }
    }
}

/// Options narrowing a count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountOptions {
    /// Number of matching documents to skip before counting.
    pub skip: Option<u64>,
    /// Maximum number of matching documents to count.
    pub limit: Option<u64>,
}

impl CountOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Applies these options to a raw match count.
    pub fn apply(&self, matched: u64) -> u64 {
        let remaining = matched.saturating_sub(self.skip.unwrap_or(0));

        match self.limit {
            Some(limit) if limit > 0 => remaining.min(limit),
            _ => remaining,
        }
    }
}
