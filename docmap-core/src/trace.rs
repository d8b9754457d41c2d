//! Call-recording decorator for backends.
//!
//! [`TraceBackend`] wraps any [`Backend`] and records each invocation as an
//! immutable [`Op`] — name, collection, rendered arguments, elapsed time —
//! in arrival order. The shared [`TraceLog`] survives handing the backend to
//! a store, so tests can assert exactly which calls the engine issued.
//! Tracing is an observation aid, not part of the engine's contract.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bson::{Document, oid::ObjectId};
use serde::Serialize;

use crate::backend::Backend;
use crate::error::MapResult;

/// One recorded backend invocation.
#[derive(Clone, Debug, Serialize)]
pub struct Op {
    /// The backend method name.
    pub name: &'static str,
    /// The collection the call addressed, empty for store-wide calls.
    pub collection: String,
    /// Rendered arguments, mostly for test failure messages.
    pub detail: String,
    /// Wall-clock duration of the call.
    pub elapsed: Duration,
}

/// Shared, ordered log of recorded operations.
#[derive(Clone, Debug, Default)]
pub struct TraceLog {
    ops: Arc<Mutex<Vec<Op>>>,
}

impl TraceLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, op: Op) {
        self.ops.lock().expect("trace log mutex poisoned").push(op);
    }

    /// Removes and returns the most recent operation.
    pub fn pop(&self) -> Option<Op> {
        self.ops.lock().expect("trace log mutex poisoned").pop()
    }

    /// Removes and returns all recorded operations, oldest first.
    pub fn take(&self) -> Vec<Op> {
        std::mem::take(&mut *self.ops.lock().expect("trace log mutex poisoned"))
    }

    /// The number of unexamined operations.
    pub fn len(&self) -> usize {
        self.ops.lock().expect("trace log mutex poisoned").len()
    }

    /// Whether every recorded operation has been examined.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Records every call made through it before delegating to the wrapped
/// backend.
#[derive(Clone, Debug)]
pub struct TraceBackend<B> {
    inner: B,
    log: TraceLog,
}

impl<B> TraceBackend<B> {
    /// Wraps a backend with a fresh log.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            log: TraceLog::new(),
        }
    }

    /// A handle to the shared log. Clone it before moving the backend into
    /// a store.
    pub fn log(&self) -> TraceLog {
        self.log.clone()
    }
}

#[async_trait]
impl<B: Backend> Backend for TraceBackend<B> {
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Vec<String>>,
        limit: Option<usize>,
    ) -> MapResult<Vec<Document>> {
        let detail = format!("filter={filter} projection={projection:?} limit={limit:?}");
        let start = Instant::now();
        let result = self.inner.find(collection, filter, projection, limit).await;
        self.log.record(Op {
            name: "find",
            collection: collection.to_string(),
            detail,
            elapsed: start.elapsed(),
        });
        result
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: Document,
        projection: Option<Vec<String>>,
    ) -> MapResult<Option<Document>> {
        let detail = format!("filter={filter} projection={projection:?}");
        let start = Instant::now();
        let result = self.inner.find_one(collection, filter, projection).await;
        self.log.record(Op {
            name: "find_one",
            collection: collection.to_string(),
            detail,
            elapsed: start.elapsed(),
        });
        result
    }

    async fn count(&self, collection: &str) -> MapResult<u64> {
        let start = Instant::now();
        let result = self.inner.count(collection).await;
        self.log.record(Op {
            name: "count",
            collection: collection.to_string(),
            detail: String::new(),
            elapsed: start.elapsed(),
        });
        result
    }

    async fn save(&self, collection: &str, document: Document) -> MapResult<ObjectId> {
        let detail = format!("document={document}");
        let start = Instant::now();
        let result = self.inner.save(collection, document).await;
        self.log.record(Op {
            name: "save",
            collection: collection.to_string(),
            detail,
            elapsed: start.elapsed(),
        });
        result
    }

    async fn remove(&self, collection: &str, filter: Document) -> MapResult<()> {
        let detail = format!("filter={filter}");
        let start = Instant::now();
        let result = self.inner.remove(collection, filter).await;
        self.log.record(Op {
            name: "remove",
            collection: collection.to_string(),
            detail,
            elapsed: start.elapsed(),
        });
        result
    }

    async fn drop_collection(&self, name: &str) -> MapResult<()> {
        let start = Instant::now();
        let result = self.inner.drop_collection(name).await;
        self.log.record(Op {
            name: "drop_collection",
            collection: name.to_string(),
            detail: String::new(),
            elapsed: start.elapsed(),
        });
        result
    }

    async fn list_collections(&self) -> MapResult<Vec<String>> {
        let start = Instant::now();
        let result = self.inner.list_collections().await;
        self.log.record(Op {
            name: "list_collections",
            collection: String::new(),
            detail: String::new(),
            elapsed: start.elapsed(),
        });
        result
    }
}
