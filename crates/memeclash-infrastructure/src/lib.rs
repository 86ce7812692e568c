//! Memeclash infrastructure: repository implementations.
//!
//! The engine core only defines persistence traits; this crate supplies the
//! in-memory versioned document store used by tests and single-process
//! embedders. Database-backed implementations slot in behind the same
//! traits.

mod memory_store;

pub use memory_store::MemoryGameStore;
