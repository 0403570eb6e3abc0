//! In-memory document storage backend for docmodel.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development,
//! testing, and small-scale deployments.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Query support** - Equality, comparison, membership and logical filter operators
//! - **Sorting and paging** - Multi-key sorts with skip and limit
//! - **Aggregation** - `$match`, `$sort`, `$skip`, `$limit`, `$project`, `$count` and `$group`
//! - **Index bookkeeping** - Named indexes that can be created, listed and dropped
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{Entity, gateway::Gateway, memory::InMemoryStore, persist::Persistable};
//! use bson::oid::ObjectId;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
//! pub struct User {
//!     #[serde(skip)]
//!     pub id: Option<ObjectId>,
//!     pub name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = Gateway::new(InMemoryStore::new());
//!
//!     let mut user = User { id: None, name: "Alice".to_string() };
//!     user.save(&gateway).await?;
//!
//!     let found = User::find_by(&gateway, "byName", &["Alice".into()])?.first().await?;
//!     assert_eq!(found.id, user.id);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_memory;

mod evaluator;
mod pipeline;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
