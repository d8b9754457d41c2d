//! Class metadata: schemas, the schema builder, and the mapped-type contract.
//!
//! A [`Schema`] is the immutable, per-class description of a mapped type: the
//! document collection it lives in, the ordered set of [`FieldDescriptor`]s,
//! the designated identity field, and any reference declarations. Schemas are
//! built once per class through [`SchemaBuilder`] (typically inside a
//! `LazyLock`, as the `mapped!` macro does) and shared for the lifetime of
//! the program.
//!
//! # Example
//!
//! ```ignore
//! use docmap_core::field::{FieldKind, FieldSpec};
//! use docmap_core::schema::Schema;
//!
//! let schema = Schema::builder("people")
//!     .identity("id")
//!     .field(FieldSpec::new("name", FieldKind::String))
//!     .field(FieldSpec::new("age", FieldKind::Int))
//!     .build()?;
//! # Ok::<(), docmap_core::error::MapError>(())
//! ```

use std::any::TypeId;
use std::collections::HashMap;

use crate::error::{MapError, MapResult};
use crate::field::{FieldDescriptor, FieldId, FieldKind, FieldSpec};
use crate::state::ObjectState;

/// The document key reserved for identity values. It can never be declared
/// as an ordinary field.
pub const ID_KEY: &str = "_id";

/// A lazily-resolved pointer to another mapped class, backed by a local
/// identity-holding field stored alongside it.
#[derive(Clone, Debug)]
pub struct ReferenceDescriptor {
    pub(crate) id: FieldId,
    name: String,
    pub(crate) local: FieldId,
    pub(crate) target: TypeId,
    target_name: &'static str,
}

impl ReferenceDescriptor {
    /// The attribute name of the reference.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The local field shadowed by this reference, which persists the
    /// target's identity.
    pub fn local_field(&self) -> FieldId {
        self.local
    }

    /// The type name of the referenced class, for diagnostics.
    pub fn target_name(&self) -> &'static str {
        self.target_name
    }
}

/// Immutable per-class metadata: collection name, ordered field descriptors,
/// the designated identity field, and reference declarations.
#[derive(Clone, Debug)]
pub struct Schema {
    collection: String,
    identity: String,
    fields: Vec<FieldDescriptor>,
    by_name: HashMap<String, usize>,
    references: Vec<ReferenceDescriptor>,
    refs_by_name: HashMap<String, usize>,
}

impl Schema {
    /// Starts building a schema for the given document collection.
    pub fn builder(collection: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            collection: collection.into(),
            identity: None,
            duplicate_identity: false,
            specs: Vec::new(),
            references: Vec::new(),
        }
    }

    /// The document collection this class persists to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The attribute name of the identity field.
    pub fn identity_name(&self) -> &str {
        &self.identity
    }

    /// The ordered field descriptors, in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Looks up an ordinary field descriptor by attribute name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(name).map(|index| &self.fields[*index])
    }

    /// Looks up a reference descriptor by attribute name.
    pub fn reference(&self, name: &str) -> Option<&ReferenceDescriptor> {
        self.refs_by_name
            .get(name)
            .map(|index| &self.references[*index])
    }

    /// The projection requested on reads: the identity key plus every
    /// declared attribute name. Backends may ignore it.
    pub fn projection(&self) -> Vec<String> {
        std::iter::once(ID_KEY.to_string())
            .chain(self.fields.iter().map(|field| field.name.clone()))
            .collect()
    }
}

/// Builder for [`Schema`] values.
///
/// Validation happens in [`build`](SchemaBuilder::build): a schema must
/// declare exactly one identity field, may not declare an ordinary field
/// under the reserved identity key, and every reference must shadow an
/// existing identity-kinded local field.
#[derive(Debug)]
pub struct SchemaBuilder {
    collection: String,
    identity: Option<String>,
    duplicate_identity: bool,
    specs: Vec<FieldSpec>,
    references: Vec<(String, String, TypeId, &'static str)>,
}

impl SchemaBuilder {
    /// Designates the identity field. Must be called exactly once.
    pub fn identity(mut self, name: impl Into<String>) -> Self {
        if self.identity.is_some() {
            self.duplicate_identity = true;
        }
        self.identity = Some(name.into());
        self
    }

    /// Declares an ordinary field.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Declares a reference to another mapped class, shadowing the named
    /// local identity-holding field.
    pub fn reference<T: 'static>(
        mut self,
        name: impl Into<String>,
        local: impl Into<String>,
    ) -> Self {
        self.references.push((
            name.into(),
            local.into(),
            TypeId::of::<T>(),
            std::any::type_name::<T>(),
        ));
        self
    }

    /// Validates the declarations and produces the immutable schema.
    pub fn build(self) -> MapResult<Schema> {
        let identity = self.identity.ok_or_else(|| {
            MapError::InvalidObject(format!(
                "class mapped to `{}` declares no identity field",
                self.collection
            ))
        })?;
        if self.duplicate_identity {
            return Err(MapError::InvalidObject(format!(
                "class mapped to `{}` declares more than one identity field",
                self.collection
            )));
        }

        let mut seen: HashMap<String, ()> = HashMap::new();
        seen.insert(identity.clone(), ());

        let mut next_id = 0u32;
        let mut fields = Vec::with_capacity(self.specs.len());
        let mut by_name = HashMap::new();
        for spec in self.specs {
            if spec.name == ID_KEY {
                return Err(MapError::InvalidObject(format!(
                    "cannot declare a field named `{ID_KEY}`, it is reserved for the backend"
                )));
            }
            if seen.insert(spec.name.clone(), ()).is_some() {
                return Err(MapError::InvalidObject(format!(
                    "attribute `{}` is declared more than once",
                    spec.name
                )));
            }
            by_name.insert(spec.name.clone(), fields.len());
            fields.push(FieldDescriptor {
                id: FieldId(next_id),
                name: spec.name,
                kind: spec.kind,
                default: spec.default,
                required: spec.required,
                unique: spec.unique,
            });
            next_id += 1;
        }

        let mut references = Vec::with_capacity(self.references.len());
        let mut refs_by_name = HashMap::new();
        for (name, local, target, target_name) in self.references {
            if seen.insert(name.clone(), ()).is_some() {
                return Err(MapError::InvalidObject(format!(
                    "attribute `{name}` is declared more than once"
                )));
            }
            let local_field = by_name
                .get(&local)
                .map(|index| &fields[*index])
                .ok_or_else(|| {
                    MapError::InvalidObject(format!(
                        "reference `{name}` shadows undeclared field `{local}`"
                    ))
                })?;
            if local_field.kind != FieldKind::Id {
                return Err(MapError::InvalidObject(format!(
                    "reference `{name}` must shadow an identity-kinded field, \
                     but `{local}` is {:?}",
                    local_field.kind
                )));
            }
            refs_by_name.insert(name.clone(), references.len());
            references.push(ReferenceDescriptor {
                id: FieldId(next_id),
                name,
                local: local_field.id,
                target,
                target_name,
            });
            next_id += 1;
        }

        Ok(Schema {
            collection: self.collection,
            identity,
            fields,
            by_name,
            references,
            refs_by_name,
        })
    }
}

/// Contract implemented by every mapped class.
///
/// A mapped class is a thin wrapper around an [`ObjectState`]: all persisted
/// values live in the state, and typed accessors read and write through the
/// class's field descriptors. The `mapped!` macro generates conforming
/// implementations; hand-written implementations are equally valid and are
/// the way to override the lifecycle hooks.
///
/// # Lifecycle hooks
///
/// The three hook methods default to no-ops. The store invokes them at fixed
/// points, each at most once per flush cycle per object:
///
/// - [`on_loaded`](Mapped::on_loaded) after the object is reconstructed from
///   a stored document;
/// - [`on_pre_flush`](Mapped::on_pre_flush) before the object's document is
///   written out (a new object has no identity yet at this point);
/// - [`on_post_flush`](Mapped::on_post_flush) after a successful save, with
///   the assigned identity visible.
pub trait Mapped: Send + Sync + Sized + 'static {
    /// The schema shared by every instance of this class.
    fn schema() -> &'static Schema;

    /// This instance's per-object state.
    fn state(&self) -> &ObjectState;

    /// Builds an instance directly from per-object state, bypassing any
    /// ordinary construction logic. Used by the store when reconstructing
    /// objects from stored documents.
    fn from_state(state: ObjectState) -> Self;

    /// Called after this object is reconstructed from a stored document.
    fn on_loaded(&self) {}

    /// Called before this object's document is written out.
    fn on_pre_flush(&self) {}

    /// Called after this object's document was successfully saved.
    fn on_post_flush(&self) {}
}

/// Looks up a field descriptor on a mapped class's schema.
///
/// Exists for generated accessors; the error arm is unreachable for
/// macro-built classes, whose schema and accessors come from one
/// declaration.
pub fn schema_field<T: Mapped>(name: &str) -> MapResult<&'static FieldDescriptor> {
    T::schema().field(name).ok_or_else(|| {
        MapError::InvalidObject(format!(
            "no field `{name}` declared on the class mapped to `{}`",
            T::schema().collection()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldKind, FieldSpec};

    struct Other;

    #[test]
    fn builds_with_one_identity() {
        let schema = Schema::builder("people")
            .identity("id")
            .field(FieldSpec::new("name", FieldKind::String))
            .field(FieldSpec::new("age", FieldKind::Int))
            .build()
            .unwrap();
        assert_eq!(schema.collection(), "people");
        assert_eq!(schema.identity_name(), "id");
        assert_eq!(schema.fields().len(), 2);
        assert_eq!(schema.projection(), vec!["_id", "name", "age"]);
        assert!(schema.field("name").is_some());
        assert!(schema.field("missing").is_none());
    }

    #[test]
    fn missing_identity_is_invalid() {
        let err = Schema::builder("people")
            .field(FieldSpec::new("name", FieldKind::String))
            .build()
            .unwrap_err();
        assert!(matches!(err, MapError::InvalidObject(_)));
    }

    #[test]
    fn duplicate_identity_is_invalid() {
        let err = Schema::builder("people")
            .identity("id")
            .identity("other")
            .build()
            .unwrap_err();
        assert!(matches!(err, MapError::InvalidObject(_)));
    }

    #[test]
    fn reserved_key_is_invalid() {
        let err = Schema::builder("people")
            .identity("id")
            .field(FieldSpec::new(ID_KEY, FieldKind::String))
            .build()
            .unwrap_err();
        assert!(matches!(err, MapError::InvalidObject(_)));
    }

    #[test]
    fn duplicate_attribute_is_invalid() {
        let err = Schema::builder("people")
            .identity("id")
            .field(FieldSpec::new("name", FieldKind::String))
            .field(FieldSpec::new("name", FieldKind::Int))
            .build()
            .unwrap_err();
        assert!(matches!(err, MapError::InvalidObject(_)));
    }

    #[test]
    fn reference_must_shadow_an_id_field() {
        let err = Schema::builder("employees")
            .identity("id")
            .field(FieldSpec::new("company_id", FieldKind::String))
            .reference::<Other>("company", "company_id")
            .build()
            .unwrap_err();
        assert!(matches!(err, MapError::InvalidObject(_)));

        let err = Schema::builder("employees")
            .identity("id")
            .reference::<Other>("company", "company_id")
            .build()
            .unwrap_err();
        assert!(matches!(err, MapError::InvalidObject(_)));

        let schema = Schema::builder("employees")
            .identity("id")
            .field(FieldSpec::new("company_id", FieldKind::Id))
            .reference::<Other>("company", "company_id")
            .build()
            .unwrap();
        assert!(schema.reference("company").is_some());
    }
}
