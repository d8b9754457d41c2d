//! Error and result types for the mapping engine.
//!
//! This module provides the error taxonomy shared by every part of the mapper.
//! Use [`MapResult<T>`] as the return type for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors raised by the mapping engine.
///
/// Schema-shape problems, value validation failures, unit-of-work state
/// violations, and backend failures each get their own variant so callers can
/// tell programmer errors apart from runtime conditions.
#[derive(Error, Debug)]
pub enum MapError {
    /// A mapped class is malformed: missing or duplicate identity field,
    /// a field declared under the reserved identity key, or a dangling
    /// reference declaration. Detected when the schema is built.
    #[error("invalid object: {0}")]
    InvalidObject(String),
    /// A value does not satisfy its field's constraints (malformed email,
    /// too many decimal places, non-coercible integer). The offending write
    /// is rejected and the previous value is left untouched.
    #[error("validation error: {0}")]
    Validation(String),
    /// More than one stored document shares a single identity value.
    /// This indicates corruption in the backend, not a caller mistake.
    #[error("one document expected in collection {0}, but more found")]
    NotOne(String),
    /// The object is already attached to a store and cannot join another
    /// unit of work.
    #[error("object is already attached to a store")]
    AlreadyAttached,
    /// The operation needs a store association the object does not have.
    #[error("object is not attached to a store")]
    Detached,
    /// The object belongs to a different store than the one operating on it.
    #[error("object does not belong to this store")]
    StoreMismatch,
    /// Conversion between document formats (BSON, JSON) failed.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// An error occurred in the underlying document backend.
    #[error("backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for mapping operations.
pub type MapResult<T> = Result<T, MapError>;

impl From<BsonError> for MapError {
    fn from(err: BsonError) -> Self {
        MapError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for MapError {
    fn from(err: SerdeJsonError) -> Self {
        MapError::Serialization(err.to_string())
    }
}
