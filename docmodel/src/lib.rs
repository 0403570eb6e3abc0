//! Main docmodel crate providing a unified interface for entity persistence.
//!
//! This crate is the primary entry point for users of the docmodel framework.
//! It re-exports the core types and functionality from the sub-crates and provides
//! convenient access to the different storage backends.
//!
//! # Features
//!
//! - **Typed entities** - Define records with Serde and `#[derive(Entity)]`
//! - **Query descriptors** - `byNameAndAge` style filters and `-age,name` style sorts
//! - **Deferred cursors** - Narrow find results with skip, limit, sort and pages before fetching
//! - **Multiple backends** - In-memory storage and MongoDB behind one backend trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmodel::{Entity, prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
//! pub struct Person {
//!     #[serde(skip)]
//!     pub id: Option<ObjectId>,
//!     pub name: String,
//!     pub age: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> ModelResult<()> {
//!     let gateway = Gateway::new(InMemoryStore::new());
//!
//!     let mut ann = Person { id: None, name: "Ann".to_string(), age: 30 };
//!     ann.save(&gateway).await?;
//!
//!     let page = Person::find_by(&gateway, "byName", &["Ann".into()])?
//!         .order("-age")?
//!         .fetch_page(1, 20)
//!         .await?;
//!     println!("Found {} people", page.len());
//!
//!     gateway.shutdown().await
//! }
//! ```
//!
//! # Lazy Initialisation
//!
//! A [`StoreClient`](client::StoreClient) opens its backend on first use and shares it
//! afterwards:
//!
//! ```ignore
//! use docmodel::{client::StoreClient, config::StoreConfig, mongodb::MongoDbStoreBuilder};
//!
//! let client = StoreClient::new(MongoDbStoreBuilder::from_config(
//!     StoreConfig::new().database("people").credentials("app", "secret"),
//! ));
//!
//! let count = Person::count(client.gateway().await?).await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as docmodel;

pub mod prelude;

pub use docmodel_core::{
    backend, client, config, cursor, descriptor, entity, error, gateway, page, persist, query,
};
pub use docmodel_macros::Entity;

// Re-export BSON types for convenience
pub use bson;
pub use async_trait::async_trait;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmodel_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmodel_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
