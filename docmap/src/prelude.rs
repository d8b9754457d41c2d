//! Convenient re-exports of commonly used types from docmap.
//!
//! ```ignore
//! use docmap::prelude::*;
//! ```

pub use docmap_core::{
    backend::Backend,
    error::{MapError, MapResult},
    field::{
        DateTimeCodec, DecimalCodec, EmailCodec, FieldCodec, FieldDescriptor, FieldId, FieldKind,
        FieldSpec, IdCodec, IntCodec, StringCodec,
    },
    schema::{ID_KEY, Mapped, ReferenceDescriptor, Schema, SchemaBuilder},
    state::ObjectState,
    store::Store,
    trace::{Op, TraceBackend, TraceLog},
};

pub use docmap_macros::mapped;
