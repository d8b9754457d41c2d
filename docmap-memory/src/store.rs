//! In-memory backend implementation.
//!
//! Stores documents as BSON in nested maps behind an async-aware read-write
//! lock. Queries scan every document in a collection (no indexing), which is
//! fine for the development and test workloads this backend targets.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;
use tracing::trace;

use docmap_core::backend::Backend;
use docmap_core::error::MapResult;
use docmap_core::schema::ID_KEY;

use crate::matcher::matches;

type CollectionMap = HashMap<String, Document>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document backend.
///
/// `MemoryBackend` is cheap to clone; clones share the same underlying data,
/// which makes it easy to keep a handle for direct inspection after moving
/// the backend into a store, or to open a second store over the same data to
/// simulate a fresh session.
///
/// # Example
///
/// ```ignore
/// use docmap_memory::MemoryBackend;
///
/// let backend = MemoryBackend::new();
/// let store = Store::new(backend.clone());
/// // `backend` still reads and writes the same collections
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    collections: Arc<RwLock<StoreMap>>,
}

impl MemoryBackend {
    /// Creates a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

fn apply_projection(document: &Document, projection: Option<&Vec<String>>) -> Document {
    match projection {
        None => document.clone(),
        Some(fields) => document
            .iter()
            .filter(|(key, _)| {
                key.as_str() == ID_KEY || fields.iter().any(|field| field == key.as_str())
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Vec<String>>,
        limit: Option<usize>,
    ) -> MapResult<Vec<Document>> {
        let store = self.collections.read().await;
        let Some(map) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut found: Vec<Document> = map
            .values()
            .filter(|document| matches(document, &filter))
            .map(|document| apply_projection(document, projection.as_ref()))
            .collect();
        // map iteration order is arbitrary; make results stable
        found.sort_by_key(|document| {
            document
                .get(ID_KEY)
                .and_then(|value| match value {
                    Bson::ObjectId(id) => Some(id.to_hex()),
                    _ => None,
                })
                .unwrap_or_default()
        });
        if let Some(limit) = limit {
            found.truncate(limit);
        }
        trace!(collection, matched = found.len(), "find");
        Ok(found)
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Vec<String>>,
    ) -> MapResult<Option<Document>> {
        Ok(self
            .find(collection, filter, projection, Some(1))
            .await?
            .pop())
    }

    async fn count(&self, collection: &str) -> MapResult<u64> {
        let store = self.collections.read().await;
        Ok(store.get(collection).map_or(0, |map| map.len() as u64))
    }

    async fn save(&self, collection: &str, mut document: Document) -> MapResult<ObjectId> {
        let id = match document.get(ID_KEY) {
            Some(Bson::ObjectId(id)) => *id,
            _ => {
                let id = ObjectId::new();
                document.insert(ID_KEY, id);
                id
            }
        };
        let mut store = self.collections.write().await;
        store
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_hex(), document);
        trace!(collection, id = %id, "save");
        Ok(id)
    }

    async fn remove(&self, collection: &str, filter: Document) -> MapResult<()> {
        let mut store = self.collections.write().await;
        if let Some(map) = store.get_mut(collection) {
            let before = map.len();
            map.retain(|_, document| !matches(document, &filter));
            trace!(collection, removed = before - map.len(), "remove");
        }
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> MapResult<()> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn list_collections(&self) -> MapResult<Vec<String>> {
        Ok(self.collections.read().await.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[tokio::test]
    async fn save_assigns_an_identity_once() {
        let backend = MemoryBackend::new();
        let id = backend
            .save("people", doc! { "name": "John" })
            .await
            .unwrap();

        let stored = backend
            .find("people", doc! { ID_KEY: id }, None, None)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].get("name"), Some(&Bson::String("John".into())));

        // saving again under the same identity replaces the document
        let again = backend
            .save("people", doc! { ID_KEY: id, "name": "Johnny" })
            .await
            .unwrap();
        assert_eq!(again, id);
        assert_eq!(backend.count("people").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn find_filters_projects_and_limits() {
        let backend = MemoryBackend::new();
        backend
            .save("people", doc! { "name": "John", "age": 41 })
            .await
            .unwrap();
        backend
            .save("people", doc! { "name": "Jane", "age": 39 })
            .await
            .unwrap();

        let janes = backend
            .find("people", doc! { "name": "Jane" }, None, None)
            .await
            .unwrap();
        assert_eq!(janes.len(), 1);

        let all = backend
            .find("people", doc! {}, None, Some(1))
            .await
            .unwrap();
        assert_eq!(all.len(), 1);

        let projected = backend
            .find("people", doc! { "name": "John" }, Some(vec!["name".into()]), None)
            .await
            .unwrap();
        assert!(projected[0].get("age").is_none());
        assert!(projected[0].get(ID_KEY).is_some());
    }

    #[tokio::test]
    async fn remove_by_filter_and_drop() {
        let backend = MemoryBackend::new();
        backend
            .save("people", doc! { "name": "John" })
            .await
            .unwrap();
        backend
            .save("people", doc! { "name": "Jane" })
            .await
            .unwrap();

        backend
            .remove("people", doc! { "name": "John" })
            .await
            .unwrap();
        assert_eq!(backend.count("people").await.unwrap(), 1);

        assert_eq!(
            backend.list_collections().await.unwrap(),
            vec!["people".to_string()]
        );
        backend.drop_collection("people").await.unwrap();
        assert_eq!(backend.count("people").await.unwrap(), 0);
        // dropping a missing collection stays quiet
        backend.drop_collection("people").await.unwrap();
    }

    #[tokio::test]
    async fn find_one_returns_at_most_one() {
        let backend = MemoryBackend::new();
        assert!(backend
            .find_one("people", doc! {}, None)
            .await
            .unwrap()
            .is_none());
        backend
            .save("people", doc! { "name": "John" })
            .await
            .unwrap();
        let found = backend
            .find_one("people", doc! { "name": "John" }, None)
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
