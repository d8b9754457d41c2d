//! Per-object state: the live half of a mapped object.
//!
//! Every mapped object owns exactly one [`ObjectState`], created with the
//! object and reclaimed with it. The state holds the object's raw
//! (post-encode) field values keyed by [`FieldId`], its identity, its store
//! association, and its unit-of-work bookkeeping (pending action, dirty
//! flag, flush-pending flag). Field descriptors never hold per-object data;
//! they read and write through this type.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use bson::{Bson, Document, oid::ObjectId};

use crate::error::{MapError, MapResult};
use crate::field::{FieldCodec, FieldDescriptor, FieldId};
use crate::schema::{ID_KEY, Schema};
use crate::store::StoreInner;

/// Shared handle to a live mapped object with the concrete type erased.
pub(crate) type ErasedHandle = Arc<dyn Any + Send + Sync>;

/// Pending unit-of-work action for the next flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Action {
    /// Save on the next flush.
    #[default]
    None,
    /// Delete the stored document on the next flush.
    Remove,
}

/// Tagged per-field value.
///
/// Ordinary fields hold their encoded wire value; reference fields hold the
/// cached resolved object together with the remote identity. Reference slots
/// never reach the backend — only the shadowed local field does.
#[derive(Clone)]
pub(crate) enum Slot {
    Raw(Bson),
    Reference {
        object: Option<ErasedHandle>,
        identity: Bson,
    },
}

#[derive(Default)]
struct StateInner {
    identity: Option<ObjectId>,
    variables: HashMap<FieldId, Slot>,
    store: Option<Weak<StoreInner>>,
    action: Action,
    dirty: bool,
    flush_pending: bool,
}

/// Per-object metadata for a mapped object.
///
/// The state is internally synchronized; a mapped object wrapping it can be
/// shared as `Arc<T>` between the identity cache and any number of holders.
/// The mutex is held only for the duration of a single accessor call.
#[derive(Default)]
pub struct ObjectState {
    inner: Mutex<StateInner>,
}

impl ObjectState {
    /// Creates empty state for a transient (never stored) object.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StateInner> {
        self.inner.lock().expect("object state mutex poisoned")
    }

    /// The identity assigned by the backend, if the object was ever saved
    /// or loaded.
    pub fn identity(&self) -> Option<ObjectId> {
        self.lock().identity
    }

    pub(crate) fn set_identity(&self, id: ObjectId) {
        self.lock().identity = Some(id);
    }

    /// The raw (encoded) value held for an ordinary field, if any.
    pub fn raw(&self, field: FieldId) -> Option<Bson> {
        match self.lock().variables.get(&field) {
            Some(Slot::Raw(raw)) => Some(raw.clone()),
            _ => None,
        }
    }

    pub(crate) fn set_raw(&self, field: FieldId, raw: Bson) {
        let mut inner = self.lock();
        inner.variables.insert(field, Slot::Raw(raw));
        inner.dirty = true;
    }

    pub(crate) fn slot(&self, field: FieldId) -> Option<Slot> {
        self.lock().variables.get(&field).cloned()
    }

    /// Stores a reference slot and its shadowed local identity in one
    /// operation, so the pair can never be observed out of sync.
    pub(crate) fn set_reference(
        &self,
        field: FieldId,
        local: FieldId,
        object: Option<ErasedHandle>,
        identity: Bson,
    ) {
        let mut inner = self.lock();
        inner.variables.insert(
            field,
            Slot::Reference {
                object,
                identity: identity.clone(),
            },
        );
        inner.variables.insert(local, Slot::Raw(identity));
        inner.dirty = true;
    }

    /// Decodes the value of a field, falling back to the declared default
    /// when the object carries none. An explicit `Null` reads as `None`.
    pub fn get_field<C: FieldCodec>(
        &self,
        field: &FieldDescriptor,
        codec: &C,
    ) -> MapResult<Option<C::Value>> {
        let raw = match self.raw(field.id()) {
            Some(raw) => Some(raw),
            None => field.default_raw().cloned(),
        };
        match raw {
            None | Some(Bson::Null) => Ok(None),
            Some(raw) => codec.decode(&raw).map(Some),
        }
    }

    /// Like [`get_field`](ObjectState::get_field), but treats an absent
    /// value as an error. Meant for fields declared with a default.
    pub fn get_required<C: FieldCodec>(
        &self,
        field: &FieldDescriptor,
        codec: &C,
    ) -> MapResult<C::Value> {
        self.get_field(field, codec)?.ok_or_else(|| {
            MapError::Validation(format!("field `{}` has no value", field.name()))
        })
    }

    /// Encodes and stores a value for a field. An invalid value is rejected
    /// before any state changes, leaving the prior value untouched.
    pub fn set_field<C: FieldCodec>(
        &self,
        field: &FieldDescriptor,
        codec: &C,
        value: &C::Value,
    ) -> MapResult<()> {
        let raw = codec.encode(value)?;
        self.set_raw(field.id(), raw);
        Ok(())
    }

    pub(crate) fn attach(&self, store: Weak<StoreInner>) -> MapResult<()> {
        let mut inner = self.lock();
        if inner.store.is_some() {
            return Err(MapError::AlreadyAttached);
        }
        inner.store = Some(store);
        Ok(())
    }

    pub(crate) fn detach(&self) {
        self.lock().store = None;
    }

    pub(crate) fn store(&self) -> Option<Arc<StoreInner>> {
        self.lock().store.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn action(&self) -> Action {
        self.lock().action
    }

    pub(crate) fn set_action(&self, action: Action) {
        self.lock().action = action;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Marks the object as staged for the next flush. Returns `true` when
    /// this call did the marking, `false` when it was already staged.
    pub(crate) fn mark_flush_pending(&self) -> bool {
        let mut inner = self.lock();
        if inner.flush_pending {
            false
        } else {
            inner.flush_pending = true;
            true
        }
    }

    pub(crate) fn clear_flush_state(&self) {
        let mut inner = self.lock();
        inner.flush_pending = false;
        inner.dirty = false;
    }

    /// Produces the backend-ready document: every ordinary field with a
    /// value, plus the identity under [`ID_KEY`] when one is known.
    /// Reference slots are skipped (their shadowed local fields persist the
    /// link). A required field with neither a value nor a default fails.
    pub fn to_document(&self, schema: &Schema) -> MapResult<Document> {
        let inner = self.lock();
        let mut document = Document::new();
        for field in schema.fields() {
            match inner.variables.get(&field.id()) {
                Some(Slot::Raw(raw)) => {
                    document.insert(field.name(), raw.clone());
                }
                _ => {
                    if field.is_required() && field.default_raw().is_none() {
                        return Err(MapError::Validation(format!(
                            "required field `{}` has no value",
                            field.name()
                        )));
                    }
                }
            }
        }
        if let Some(id) = inner.identity {
            document.insert(ID_KEY, id);
        }
        Ok(document)
    }

    /// Populates the state from a stored document. Attributes absent from
    /// the schema are dropped. Does not mark the object dirty.
    pub(crate) fn populate(&self, schema: &Schema, document: &Document) {
        let mut inner = self.lock();
        for (key, value) in document.iter() {
            if key == ID_KEY {
                if let Bson::ObjectId(id) = value {
                    inner.identity = Some(*id);
                }
                continue;
            }
            if let Some(field) = schema.field(key) {
                inner
                    .variables
                    .insert(field.id(), Slot::Raw(value.clone()));
            }
        }
    }

    /// Renders the outbound document as JSON, for debugging and assertions.
    pub fn to_json(&self, schema: &Schema) -> MapResult<serde_json::Value> {
        let document = self.to_document(schema)?;
        Ok(serde_json::to_value(&document)?)
    }
}

impl fmt::Debug for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("ObjectState")
            .field("identity", &inner.identity)
            .field("fields", &inner.variables.len())
            .field("action", &inner.action)
            .field("dirty", &inner.dirty)
            .field("flush_pending", &inner.flush_pending)
            .finish()
    }
}
