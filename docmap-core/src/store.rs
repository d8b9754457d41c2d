//! The unit-of-work engine: identity map, pending set, and flush.
//!
//! A [`Store`] owns the connection to a document [`Backend`], an identity
//! cache guaranteeing at most one live object per stored identity, and the
//! set of objects staged for the next [`flush`](Store::flush). Application
//! code stages objects with [`add`](Store::add) and [`remove`](Store::remove),
//! reads through [`get`](Store::get) and the `find` family, and commits
//! batched mutations with `flush`.
//!
//! # Identity map
//!
//! Loading the same identity twice through one store returns the same
//! instance, not a copy, and in-memory state always wins over a freshly
//! fetched document. Cache entries are shared handles: callers holding an
//! `Arc` keep their object alive across [`drop_cache`](Store::drop_cache).
//!
//! # Concurrency
//!
//! A store is a unit of work meant for one logical session. Its internal
//! state sits behind a single mutex that is never held across a backend
//! call; sharing one store between threads is safe but serializes on that
//! lock, and interleaved sessions should prefer separate stores over one
//! shared one.
//!
//! # Example
//!
//! ```ignore
//! let store = Store::new(MemoryBackend::new());
//!
//! let person = Arc::new(Person::new());
//! person.set_name("Jane")?;
//! store.add(&person)?;
//! store.flush().await?;
//!
//! let again = store.get::<Person>(person.id().unwrap()).await?;
//! assert!(Arc::ptr_eq(&person, &again.unwrap()));
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use bson::{Bson, Document, doc, oid::ObjectId};
use tracing::debug;

use crate::backend::Backend;
use crate::error::{MapError, MapResult};
use crate::schema::{ID_KEY, Mapped, Schema};
use crate::state::{Action, ErasedHandle, ObjectState};

/// Type-erased view of a mapped object, used by the flush machinery.
pub(crate) trait ErasedMapped: Send + Sync {
    fn schema(&self) -> &'static Schema;
    fn object_state(&self) -> &ObjectState;
    fn fire_loaded(&self);
    fn fire_pre_flush(&self);
    fn fire_post_flush(&self);
}

impl<T: Mapped> ErasedMapped for T {
    fn schema(&self) -> &'static Schema {
        T::schema()
    }

    fn object_state(&self) -> &ObjectState {
        self.state()
    }

    fn fire_loaded(&self) {
        self.on_loaded();
    }

    fn fire_pre_flush(&self) {
        self.on_pre_flush();
    }

    fn fire_post_flush(&self) {
        self.on_post_flush();
    }
}

/// Both views of one live object: the erased working interface and the
/// `Any` handle used for typed retrieval out of the identity cache.
#[derive(Clone)]
struct Entry {
    type_id: TypeId,
    erased: Arc<dyn ErasedMapped>,
    handle: ErasedHandle,
}

impl Entry {
    fn new<T: Mapped>(object: &Arc<T>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            erased: object.clone(),
            handle: object.clone(),
        }
    }
}

#[derive(Default)]
struct Shared {
    cache: HashMap<(TypeId, ObjectId), Entry>,
    pending: Vec<Entry>,
    collections: Vec<String>,
}

pub(crate) struct StoreInner {
    backend: Box<dyn Backend>,
    shared: Mutex<Shared>,
}

/// The unit-of-work engine over a document backend.
///
/// Cloning a `Store` yields a second handle to the same session: both clones
/// share the identity cache and pending set.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.inner.backend)
            .finish()
    }
}

impl Store {
    /// Creates a store over the given backend.
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self::from_boxed(Box::new(backend))
    }

    /// Creates a store over an already boxed backend.
    pub fn from_boxed(backend: Box<dyn Backend>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                backend,
                shared: Mutex::new(Shared::default()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.inner.shared.lock().expect("store mutex poisoned")
    }

    /// Records the schema's collection name the first time this store
    /// touches it, and returns the name.
    fn register_collection(&self, schema: &Schema) -> String {
        let mut shared = self.shared();
        if !shared.collections.iter().any(|name| name == schema.collection()) {
            shared.collections.push(schema.collection().to_string());
        }
        schema.collection().to_string()
    }

    /// The collection names this store has touched, in first-use order.
    pub fn collections(&self) -> Vec<String> {
        self.shared().collections.clone()
    }

    fn stage(&self, entry: Entry) {
        if entry.erased.object_state().mark_flush_pending() {
            self.shared().pending.push(entry);
        }
    }

    /// Attaches a transient object to this store and stages it for the next
    /// flush. Fails with [`MapError::AlreadyAttached`] when the object
    /// already belongs to any store — an object cannot live in two units of
    /// work at once.
    pub fn add<T: Mapped>(&self, object: &Arc<T>) -> MapResult<()> {
        let state = object.state();
        state.attach(Arc::downgrade(&self.inner))?;
        // a previously removed object re-enters the save path
        state.set_action(Action::None);
        self.stage(Entry::new(object));
        Ok(())
    }

    /// Marks an object of this store for deletion on the next flush and
    /// evicts it from the identity cache immediately, so in-session reads no
    /// longer return it. Fails when the object is attached to a different
    /// store or to none.
    pub fn remove<T: Mapped>(&self, object: &Arc<T>) -> MapResult<()> {
        let state = object.state();
        match state.store() {
            Some(owner) if Arc::ptr_eq(&owner, &self.inner) => {}
            Some(_) => return Err(MapError::StoreMismatch),
            None => return Err(MapError::Detached),
        }
        state.set_action(Action::Remove);
        self.stage(Entry::new(object));
        if let Some(id) = state.identity() {
            self.shared().cache.remove(&(TypeId::of::<T>(), id));
        }
        Ok(())
    }

    /// Writes out every staged object: removals issue a backend delete,
    /// everything else saves and receives its identity. Loaded objects with
    /// modified fields are picked up as well. Each object is processed at
    /// most once per call, and processed entries leave the pending set.
    ///
    /// There is no transaction boundary: when a backend call fails, the
    /// failed object and the unprocessed remainder stay pending and the
    /// error propagates, so `flush` can simply be re-run.
    pub async fn flush(&self) -> MapResult<()> {
        let mut batch = std::mem::take(&mut self.shared().pending);
        // dirty survivors in the identity map join the batch
        let cached: Vec<Entry> = self.shared().cache.values().cloned().collect();
        for entry in cached {
            let state = entry.erased.object_state();
            if state.is_dirty() && state.mark_flush_pending() {
                batch.push(entry);
            }
        }

        debug!(staged = batch.len(), "flush");
        for index in 0..batch.len() {
            if let Err(error) = self.flush_one(&batch[index]).await {
                let mut shared = self.shared();
                shared.pending.extend(batch[index..].iter().cloned());
                return Err(error);
            }
        }
        Ok(())
    }

    async fn flush_one(&self, entry: &Entry) -> MapResult<()> {
        let schema = entry.erased.schema();
        let state = entry.erased.object_state();
        let collection = self.register_collection(schema);

        entry.erased.fire_pre_flush();
        let document = state.to_document(schema)?;

        if state.action() == Action::Remove {
            let filter = match state.identity() {
                Some(id) => doc! { ID_KEY: id },
                // never persisted: match the whole document
                None => document,
            };
            debug!(collection = %collection, "removing document");
            self.inner.backend.remove(&collection, filter).await?;
            state.detach();
            state.clear_flush_state();
            return Ok(());
        }

        let id = self.inner.backend.save(&collection, document).await?;
        debug!(collection = %collection, id = %id, "saved document");
        state.set_identity(id);
        self.shared()
            .cache
            .insert((entry.type_id, id), entry.clone());
        state.clear_flush_state();
        entry.erased.fire_post_flush();
        Ok(())
    }

    /// Returns the object with the given identity, or `None` when no such
    /// document exists.
    ///
    /// An identity-cache hit returns the cached instance without touching
    /// the backend. A miss issues a bounded lookup (limit 2): finding two
    /// documents under one identity is a backend integrity violation and
    /// fails with [`MapError::NotOne`].
    pub async fn get<T: Mapped>(&self, id: ObjectId) -> MapResult<Option<Arc<T>>> {
        let schema = T::schema();
        let cached = {
            let shared = self.shared();
            shared
                .cache
                .get(&(TypeId::of::<T>(), id))
                .map(|entry| entry.handle.clone())
        };
        if let Some(handle) = cached {
            return downcast::<T>(handle).map(Some);
        }

        let collection = self.register_collection(schema);
        let documents = self
            .inner
            .backend
            .find(
                &collection,
                doc! { ID_KEY: id },
                Some(schema.projection()),
                Some(2),
            )
            .await?;
        match documents.as_slice() {
            [] => Ok(None),
            [document] => self.build_doc::<T>(document).map(Some),
            _ => Err(MapError::NotOne(collection)),
        }
    }

    /// Returns every object matching the opaque filter. Each call issues a
    /// fresh backend query; reissuing the call restarts the sequence.
    pub async fn find<T: Mapped>(&self, filter: Document) -> MapResult<Vec<Arc<T>>> {
        let schema = T::schema();
        let collection = self.register_collection(schema);
        let documents = self
            .inner
            .backend
            .find(&collection, filter, Some(schema.projection()), None)
            .await?;
        documents
            .iter()
            .map(|document| self.build_doc::<T>(document))
            .collect()
    }

    /// Sugared [`find`](Store::find) over attribute/value equality pairs.
    pub async fn find_by<T: Mapped>(&self, fields: &[(&str, Bson)]) -> MapResult<Vec<Arc<T>>> {
        self.find::<T>(equality_filter(fields)).await
    }

    /// Returns at most one object matching the opaque filter.
    pub async fn find_one<T: Mapped>(&self, filter: Document) -> MapResult<Option<Arc<T>>> {
        let schema = T::schema();
        let collection = self.register_collection(schema);
        let document = self
            .inner
            .backend
            .find_one(&collection, filter, Some(schema.projection()))
            .await?;
        match document {
            Some(document) => self.build_doc::<T>(&document).map(Some),
            None => Ok(None),
        }
    }

    /// Sugared [`find_one`](Store::find_one) over attribute/value equality
    /// pairs.
    pub async fn find_one_by<T: Mapped>(
        &self,
        fields: &[(&str, Bson)],
    ) -> MapResult<Option<Arc<T>>> {
        self.find_one::<T>(equality_filter(fields)).await
    }

    /// Returns the backend's document count for the class's collection.
    /// Always issues a backend call; staged-but-unflushed objects are not
    /// reflected.
    pub async fn count<T: Mapped>(&self) -> MapResult<u64> {
        let collection = self.register_collection(T::schema());
        self.inner.backend.count(&collection).await
    }

    /// Reconstructs an object from a stored document.
    ///
    /// The identity cache is authoritative: when an object for this identity
    /// is already live, it is returned unchanged and the fetched document is
    /// discarded. Otherwise the object is materialized directly from the
    /// document (normal construction logic is bypassed), cached, and its
    /// `on_loaded` hook fires.
    fn build_doc<T: Mapped>(&self, document: &Document) -> MapResult<Arc<T>> {
        let schema = T::schema();
        let id = document
            .get(ID_KEY)
            .and_then(|value| match value {
                Bson::ObjectId(id) => Some(*id),
                _ => None,
            })
            .ok_or_else(|| {
                MapError::Backend(format!(
                    "stored document in `{}` carries no identity",
                    schema.collection()
                ))
            })?;

        let cached = {
            let shared = self.shared();
            shared
                .cache
                .get(&(TypeId::of::<T>(), id))
                .map(|entry| entry.handle.clone())
        };
        if let Some(handle) = cached {
            return downcast::<T>(handle);
        }

        let state = ObjectState::new();
        state.attach(Arc::downgrade(&self.inner))?;
        state.populate(schema, document);
        let object = Arc::new(T::from_state(state));
        self.shared()
            .cache
            .insert((TypeId::of::<T>(), id), Entry::new(&object));
        object.on_loaded();
        Ok(object)
    }

    /// Clears the identity map. Backend contents and explicitly staged
    /// objects are unaffected, but unstaged in-memory modifications on
    /// evicted objects will no longer be picked up by `flush`.
    pub fn drop_cache(&self) {
        self.shared().cache.clear();
    }

    /// Drops the class's backend collection.
    pub async fn drop_collection<T: Mapped>(&self) -> MapResult<()> {
        let collection = self.register_collection(T::schema());
        self.inner.backend.drop_collection(&collection).await
    }

    /// Drops every non-system backend collection.
    pub async fn drop_collections(&self) -> MapResult<()> {
        for name in self.inner.backend.list_collections().await? {
            if name.starts_with("system") {
                continue;
            }
            self.inner.backend.drop_collection(&name).await?;
        }
        Ok(())
    }
}

fn equality_filter(fields: &[(&str, Bson)]) -> Document {
    fields
        .iter()
        .map(|(name, value)| ((*name).to_string(), value.clone()))
        .collect()
}

fn downcast<T: Mapped>(handle: ErasedHandle) -> MapResult<Arc<T>> {
    handle.downcast::<T>().map_err(|_| {
        MapError::Validation("identity cache held an object of an unexpected type".into())
    })
}
