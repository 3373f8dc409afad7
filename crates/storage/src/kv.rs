//! Ordered key-value store abstraction.
//!
//! The ledger is written against this trait; the production engine (a
//! LevelDB-like store) lives behind it. The contract it must honor:
//!
//! - `get` distinguishes "not found" from backend failure
//! - `commit_batch` is all-or-nothing
//! - `iter_prefix` yields exactly the keys sharing the prefix, in ascending
//!   byte order

use crate::StoreError;

/// A put or delete queued in a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Write `key` = `value`.
    Put(Vec<u8>, Vec<u8>),
    /// Remove `key` (absent keys are fine).
    Delete(Vec<u8>),
}

/// An ordered set of writes applied atomically by [`KvStore::commit_batch`].
#[derive(Debug, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Put(key.into(), value.into()));
    }

    /// Queue a delete.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete(key.into()));
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch has no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Queued operations in insertion order.
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Consume the batch, returning its operations.
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Ordered byte-keyed store with atomic batch writes and prefix iteration.
pub trait KvStore: Send + Sync {
    /// Read the value for `key`, or `StoreError::NotFound`.
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError>;

    /// Write a single key.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Delete a single key. Deleting an absent key succeeds.
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;

    /// Apply a batch atomically: either every operation becomes visible or
    /// none do.
    fn commit_batch(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Iterate `(key, value)` pairs whose key starts with `prefix`, in
    /// ascending byte order. An empty prefix iterates the whole store.
    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>;

    /// Whether `key` exists.
    fn contains(&self, key: &[u8]) -> Result<bool, StoreError> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
