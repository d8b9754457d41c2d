//! Object-document mapper with an identity-map / unit-of-work engine.
//!
//! This crate is the primary entry point for users of the docmap framework.
//! It re-exports the core engine, the `mapped!` declaration macro, and the
//! in-memory backend.
//!
//! # Features
//!
//! - **Declarative mapped classes** - Declare fields, defaults, and
//!   references once; get a typed accessor pair per field
//! - **Identity map** - Loading the same identity twice through one store
//!   returns the same live instance, never a copy
//! - **Unit of work** - Mutations accumulate and commit in one
//!   [`flush`](store::Store::flush); removals and saves batch together
//! - **Pluggable backends** - Any document store implementing the
//!   [`Backend`](backend::Backend) capability plugs in; an in-memory
//!   implementation ships in [`memory`]
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use docmap::{mapped, prelude::*};
//! use docmap::memory::MemoryBackend;
//!
//! mapped! {
//!     pub struct Person in "people" {
//!         identity id,
//!         name: string = "",
//!         age: int,
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> MapResult<()> {
//!     let store = Store::new(MemoryBackend::new());
//!
//!     let person = Arc::new(Person::new());
//!     person.set_name("Jane")?;
//!     person.set_age(39)?;
//!     store.add(&person)?;
//!     store.flush().await?;
//!
//!     // the backend assigned an identity during the flush
//!     let id = person.id().unwrap();
//!
//!     // identity-map law: same instance, no second allocation
//!     let again = store.get::<Person>(id).await?.unwrap();
//!     assert!(Arc::ptr_eq(&person, &again));
//!
//!     Ok(())
//! }
//! ```
//!
//! # References
//!
//! A reference field points at another mapped class and persists through a
//! shadowed local identity field:
//!
//! ```ignore
//! mapped! {
//!     pub struct Employee in "employees" {
//!         identity id,
//!         name: string = "",
//!         company_id: id,
//!         company: reference(Company, company_id),
//!     }
//! }
//!
//! employee.set_company(Some(&company))?;
//! let resolved = employee.company().await?;
//! ```
//!
//! # Tracing backend calls
//!
//! Wrap any backend in a [`TraceBackend`](trace::TraceBackend) to record
//! the calls the engine issues — the test suites use this to pin down the
//! exact backend traffic of every operation.

pub mod prelude;

pub use docmap_core::{backend, error, field, reference, schema, state, store, trace};

/// Declarative schema registration for mapped classes.
pub use docmap_macros::mapped;

// Value crates used by generated accessors.
pub use bson;
pub use chrono;
pub use rust_decimal;

/// In-memory backend implementation.
pub mod memory {
    pub use docmap_memory::MemoryBackend;
}
