//! The storage capability consumed by the store.
//!
//! [`Backend`] abstracts the underlying document store: an implementation
//! provides lookup, counting, saving, and removal over named collections,
//! plus the two collection-management calls the store's maintenance
//! operations need. Query execution, transport, and wire protocol all live
//! behind this trait; the mapping engine treats filters as opaque documents
//! and passes them straight through.
//!
//! Implementations must be thread-safe (`Send + Sync`) and are addressed by
//! collection name. All methods are async; the engine treats each as a
//! single round-trip to the store.

use std::fmt::Debug;

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};

use crate::error::MapResult;

/// Abstract interface to a document store.
///
/// # Identity
///
/// Documents carry their identity under the reserved `_id` key.
/// [`save`](Backend::save) assigns a fresh identity when the document has
/// none and returns the identity either way; with an identity present it
/// replaces the stored document (upsert).
///
/// # Errors
///
/// Operations return [`MapResult`]; backend failures surface as
/// [`MapError::Backend`](crate::error::MapError::Backend) and propagate out
/// of the store uncaught — no retry is attempted.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// Returns the documents matching `filter`, optionally restricted to a
    /// projection of field names and a result limit.
    ///
    /// The filter is opaque to the mapping layer; plain key/value pairs are
    /// interpreted as equality by the shipped backends. The projection is an
    /// optimization — backends may return full documents.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Vec<String>>,
        limit: Option<usize>,
    ) -> MapResult<Vec<Document>>;

    /// Returns at most one document matching `filter`.
    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Vec<String>>,
    ) -> MapResult<Option<Document>>;

    /// Returns the number of documents in the collection.
    async fn count(&self, collection: &str) -> MapResult<u64>;

    /// Saves a document, assigning an identity when it carries none.
    /// Returns the document's identity.
    async fn save(&self, collection: &str, document: Document) -> MapResult<ObjectId>;

    /// Removes every document matching `filter`.
    async fn remove(&self, collection: &str, filter: Document) -> MapResult<()>;

    /// Drops a collection and all its documents. Dropping a collection that
    /// does not exist is a no-op.
    async fn drop_collection(&self, name: &str) -> MapResult<()>;

    /// Lists the names of all collections in the store.
    async fn list_collections(&self) -> MapResult<Vec<String>>;
}
