//! MongoDB backend implementation for docmodel.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait,
//! enabling persistent document storage with full query support using MongoDB's querying capabilities.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmodel = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Native queries** - Compiled filters, sorts and aggregation pipelines run on the server
//! - **Async/await** - Fully asynchronous API built on MongoDB's async driver
//! - **Indexing** - Creating, listing and dropping MongoDB indexes
//!
//! # Connection
//!
//! The builder takes a [`StoreConfig`](docmodel_core::config::StoreConfig): either a full
//! connection string or a host and port, the target database, and optional credentials.
//! Credentials are only used when both a username and a password are set.
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{backend::StoreBackendBuilder, config::StoreConfig, mongodb::MongoDbStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder(StoreConfig::new().database("my_database"))
//!         .build()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_mongodb;

pub mod options;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
