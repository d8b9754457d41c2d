//! Lazily-resolved references between mapped objects.
//!
//! A reference field is a pointer to another mapped object, backed by a
//! local identity-holding field persisted alongside it. Assigning a
//! reference updates both halves in one operation: the cached target handle
//! and the raw identity in the shadowed local field, so the link survives a
//! reload without the live object.
//!
//! Reads resolve through the store rather than caching results: a reference
//! that was never assigned in-process looks up the local identity through
//! the owner's attached store on every read. The identity cache is what
//! makes repeated resolution cheap.

use std::any::TypeId;
use std::sync::Arc;

use bson::Bson;

use crate::error::{MapError, MapResult};
use crate::schema::{Mapped, Schema};
use crate::state::{ErasedHandle, ObjectState, Slot};
use crate::store::Store;

/// Resolves the reference named `name` on an object with the given state.
///
/// When a target was explicitly assigned, resolution goes through the
/// target's own store by identity (hitting the identity cache when the
/// object is live); a never-persisted target is handed back directly.
/// Otherwise the local identity is read through the owner's attached store.
/// An absent or null local identity resolves to `None`.
pub async fn get<T: Mapped>(
    schema: &'static Schema,
    name: &str,
    state: &ObjectState,
) -> MapResult<Option<Arc<T>>> {
    let descriptor = lookup::<T>(schema, name)?;

    match state.slot(descriptor.id) {
        Some(Slot::Reference { object, identity }) => {
            let Some(handle) = object else {
                // explicitly cleared
                return Ok(None);
            };
            let target = downcast::<T>(handle, name)?;
            let remote_id = match identity {
                Bson::ObjectId(id) => Some(id),
                _ => None,
            };
            match (remote_id, target.state().store()) {
                (Some(id), Some(owner)) => Store::from_inner(owner).get::<T>(id).await,
                // target was never persisted; hand back the live instance
                _ => Ok(Some(target)),
            }
        }
        _ => {
            let id = match state.raw(descriptor.local) {
                Some(Bson::ObjectId(id)) => Some(id),
                _ => None,
            };
            let Some(id) = id else {
                return Ok(None);
            };
            let owner = state.store().ok_or(MapError::Detached)?;
            Store::from_inner(owner).get::<T>(id).await
        }
    }
}

/// Assigns the reference named `name`, or clears it with `None`.
///
/// The cached target handle and the shadowed local field are written in the
/// same operation. A target without an identity (not yet flushed) leaves the
/// local field null; the link becomes durable once the target is saved and
/// the reference is assigned again, or the owner keeps resolving it through
/// the cached handle in the meantime.
pub fn set<T: Mapped>(
    schema: &'static Schema,
    name: &str,
    state: &ObjectState,
    value: Option<&Arc<T>>,
) -> MapResult<()> {
    let descriptor = lookup::<T>(schema, name)?;

    // read the target's identity before touching the owner's lock
    let identity = match value.and_then(|target| target.state().identity()) {
        Some(id) => Bson::ObjectId(id),
        None => Bson::Null,
    };
    let handle = value.map(|target| {
        let handle: ErasedHandle = target.clone();
        handle
    });
    state.set_reference(descriptor.id, descriptor.local, handle, identity);
    Ok(())
}

fn lookup<'a, T: Mapped>(
    schema: &'a Schema,
    name: &str,
) -> MapResult<&'a crate::schema::ReferenceDescriptor> {
    let descriptor = schema.reference(name).ok_or_else(|| {
        MapError::InvalidObject(format!(
            "no reference `{name}` declared on the class mapped to `{}`",
            schema.collection()
        ))
    })?;
    if descriptor.target != TypeId::of::<T>() {
        return Err(MapError::Validation(format!(
            "reference `{name}` resolves to `{}`, not the requested type",
            descriptor.target_name()
        )));
    }
    Ok(descriptor)
}

fn downcast<T: Mapped>(handle: ErasedHandle, name: &str) -> MapResult<Arc<T>> {
    handle.downcast::<T>().map_err(|_| {
        MapError::Validation(format!(
            "reference `{name}` holds an object of an unexpected type"
        ))
    })
}
