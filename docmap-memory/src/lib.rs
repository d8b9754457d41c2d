//! In-memory document backend for docmap.
//!
//! This crate provides a thread-safe, in-memory implementation of the
//! [`Backend`](docmap_core::backend::Backend) capability. It uses
//! async-aware read-write locks for concurrent access and is ideal for
//! development and tests.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using an
//!   async-aware RwLock
//! - **Shared clones** - Clones share the same data, so a handle kept
//!   outside the store can inspect raw documents or back a second session
//! - **Opaque filters** - Plain key/value filters are matched by equality,
//!   with numeric widths normalized
//!
//! # Quick Start
//!
//! ```ignore
//! use docmap::{mapped, prelude::*};
//! use docmap_memory::MemoryBackend;
//!
//! mapped! {
//!     pub struct User in "users" {
//!         identity id,
//!         name: string = "",
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> MapResult<()> {
//!     let store = Store::new(MemoryBackend::new());
//!
//!     let user = std::sync::Arc::new(User::new());
//!     user.set_name("Alice")?;
//!     store.add(&user)?;
//!     store.flush().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_memory;

pub mod matcher;
pub mod store;

pub use store::MemoryBackend;
