#![allow(dead_code)]

//! Shared fixtures for the integration suites: a mapped test class and a
//! store wired through a call-recording backend.

use docmap::memory::MemoryBackend;
use docmap::prelude::*;

mapped! {
    /// Test subject shared by the store lifecycle suites.
    #[derive(Debug)]
    pub struct Person in "people" {
        identity id,
        name: string = "",
        full_name: string = "",
    }
}

/// A store over a fresh in-memory backend, plus the op log recording every
/// backend call it makes.
pub fn store() -> (Store, TraceLog) {
    store_over(MemoryBackend::new())
}

/// A store over the given backend. Pass a clone of an existing backend to
/// simulate a fresh session over the same stored data.
pub fn store_over(backend: MemoryBackend) -> (Store, TraceLog) {
    let traced = TraceBackend::new(backend);
    let log = traced.log();
    (Store::new(traced), log)
}

/// Pops the most recent op and asserts its name.
pub fn assert_op(log: &TraceLog, name: &str) -> Op {
    let op = log.pop().expect("expected a recorded backend op");
    assert_eq!(op.name, name, "unexpected backend op: {op:?}");
    op
}

/// The op names of a drained log, oldest first.
pub fn op_names(ops: &[Op]) -> Vec<&'static str> {
    ops.iter().map(|op| op.name).collect()
}
