//! A data-access layer that persists entities to a document store without hand-written query code.
//!
//! This crate is the core of the docmodel project and provides:
//!
//! - **Descriptor compiler** ([`descriptor`]) - Turns `byNameAndAge` / `-age,name` into filters and sorts
//! - **Query types** ([`query`]) - Filter, sort and count specifications handed to backends
//! - **Entity traits** ([`entity`]) - Identity handling and the entity/document mapping
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing storage backends
//! - **Cursors** ([`cursor`]) - Deferred find/aggregate results materialized into entities
//! - **Gateway** ([`gateway`]) - Count, find, aggregate, save, delete and index operations
//! - **Entity methods** ([`persist`]) - The gateway operations as methods on entity types
//! - **Lazy client** ([`client`]) - One-shot, memoized store initialisation
//! - **Configuration** ([`config`]) - Store connection settings
//! - **Pagination** ([`page`]) - 1-indexed page parameters
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmodel::{Entity, prelude::*};
//! use bson::oid::ObjectId;
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
//! let adults = Person::find_by(&gateway, "byCity", &["Oslo".into()])?
//!     .order("-age")?
//!     .fetch_page(1, 20)
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmodel_core;

pub mod backend;
pub mod client;
pub mod config;
pub mod cursor;
pub mod descriptor;
pub mod entity;
pub mod error;
pub mod gateway;
pub mod page;
pub mod persist;
pub mod query;

#[cfg(test)]
mod testing;
