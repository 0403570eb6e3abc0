//! Error types and result types for data-access operations.
//!
//! This module provides the error taxonomy shared by the descriptor compiler, the cursor
//! engine, the gateway and every backend. Use [`ModelResult<T>`] as the return type for
//! fallible operations.

use bson::error::Error as BsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when persisting or retrieving entities.
///
/// Descriptor and mapping errors are local to a call. Store errors are never retried by this
/// crate and surface to the caller as they are.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The store could not be initialised (unreachable host, bad credentials, bad URI).
    ///
    /// Once reported by a [`StoreClient`](crate::client::StoreClient), the failure is kept
    /// until the client is reset.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A descriptor names more fields than there are positional values.
    #[error("Descriptor '{descriptor}' names {expected} field(s) but {supplied} value(s) were supplied")]
    ArgumentCount {
        /// The descriptor as written by the caller.
        descriptor: String,
        /// Number of fields parsed from the descriptor.
        expected: usize,
        /// Number of values supplied.
        supplied: usize,
    },
    /// A descriptor could not be parsed.
    /// The first argument is the descriptor, the second explains what is wrong with it.
    #[error("Invalid descriptor '{0}': {1}")]
    InvalidDescriptor(String, String),
    /// A document does not fit the shape of the entity it is mapped into.
    #[error("Argument mismatch: {0}")]
    ArgumentMismatch(String),
    /// A single entity was requested but the result was empty.
    /// The argument is the collection name.
    #[error("No entity found in collection {0}")]
    NotFound(String),
    /// An entity could not be converted into a document.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The backend rejected a document because of its structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A document with the given identity already exists in the collection.
    /// The first argument is the identity, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for data-access operations.
pub type ModelResult<T> = Result<T, ModelError>;

impl From<BsonError> for ModelError {
    fn from(err: BsonError) -> Self {
        ModelError::Serialization(err.to_string())
    }
}
