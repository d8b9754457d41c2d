//! Object-document mapping engine built around an identity-map /
//! unit-of-work store.
//!
//! This crate is the core of the docmap project and provides:
//!
//! - **Field declarations and codecs** ([`field`]) - Schema-level attribute
//!   descriptors and the encode/decode pairs converting between in-memory
//!   and wire-level values
//! - **Class metadata** ([`schema`]) - Immutable per-class schemas, the
//!   schema builder, and the [`Mapped`](schema::Mapped) contract
//! - **Per-object state** ([`state`]) - The raw value map, identity slot,
//!   and unit-of-work bookkeeping backing every mapped object
//! - **References** ([`reference`]) - Lazily-resolved pointers between
//!   mapped objects
//! - **Backend abstraction** ([`backend`]) - The capability trait a
//!   document store implements
//! - **The store** ([`store`]) - The identity-map / unit-of-work engine
//! - **Tracing** ([`trace`]) - A call-recording backend decorator
//! - **Error handling** ([`error`]) - The shared error taxonomy
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docmap_core::store::Store;
//!
//! let store = Store::new(backend);
//!
//! let person = Arc::new(Person::new());
//! person.set_name("Jane")?;
//! store.add(&person)?;
//! store.flush().await?;
//!
//! let reloaded = store.get::<Person>(person.id().unwrap()).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_core;

pub mod backend;
pub mod error;
pub mod field;
pub mod reference;
pub mod schema;
pub mod state;
pub mod store;
pub mod trace;
