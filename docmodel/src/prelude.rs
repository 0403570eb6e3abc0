//! Convenient re-exports of commonly used types from docmodel.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docmodel::prelude::*;
//! ```
//!
//! This provides access to:
//! - Entity traits and the entity-facing persistence methods
//! - The gateway, repositories and cursors
//! - Store backends, builders and configuration
//! - Query types and error types

pub use docmodel_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    client::StoreClient,
    config::StoreConfig,
    cursor::{AggregateCursor, EntityStream, Fetched, FindCursor},
    entity::{Entity, EntityExt, SkippedDocument},
    error::{ModelError, ModelResult},
    gateway::{Gateway, Repository},
    page::PaginationParams,
    persist::Persistable,
    query::{CountOptions, FilterSpec, Query, SortDirection, SortSpec},
};
pub use bson::{Bson, Document, doc, oid::ObjectId};
