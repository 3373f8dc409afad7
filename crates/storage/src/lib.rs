//! Ordered key-value storage for the ledger.
//!
//! This crate defines the storage abstraction the chain store is written
//! against, along with the in-memory backend used by tests and simulation.
//!
//! # Design
//!
//! The production engine (a LevelDB-like ordered store) is an external
//! collaborator: the ledger only depends on the [`KvStore`] trait —
//! point reads with a distinct not-found error, single-key writes, atomic
//! batches, and prefix-scoped ordered iteration.
//!
//! The [`keys`] module owns the key-space: every persisted record's key
//! starts with a [`DataEntryPrefix`] byte, and the prefix alone determines
//! the value's schema.

#![warn(missing_docs)]

mod error;
pub mod keys;
mod kv;
mod memory;

pub use error::StoreError;
pub use keys::{next_prefix, DataEntryPrefix};
pub use kv::{BatchOp, KvStore, WriteBatch};
pub use memory::MemoryKv;
