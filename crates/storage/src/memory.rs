//! In-memory ordered store.
//!
//! The backend used by tests and deterministic simulation. A `BTreeMap`
//! behind a `parking_lot::RwLock` gives the same ordered-iteration and
//! atomic-batch contract as the production engine.

use crate::keys::next_prefix;
use crate::kv::{BatchOp, KvStore, WriteBatch};
use crate::StoreError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

const NO_FAULT: usize = usize::MAX;

/// In-memory [`KvStore`] backend.
///
/// Batches apply under a single write lock, so readers never observe a
/// partially applied batch. `iter_prefix` snapshots the matching range;
/// iteration is not invalidated by concurrent writes.
#[derive(Default)]
pub struct MemoryKv {
    map: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,

    /// Fault injection: fail `commit_batch` once the op budget is exceeded.
    /// Used by persist-atomicity tests; `NO_FAULT` disables it.
    fault_budget: AtomicUsize,
}

impl MemoryKv {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            map: RwLock::new(BTreeMap::new()),
            fault_budget: AtomicUsize::new(NO_FAULT),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Make the next `commit_batch` fail if it carries more than `budget`
    /// operations, without applying anything. One-shot; cleared after it
    /// fires.
    pub fn inject_batch_fault(&self, budget: usize) {
        self.fault_budget.store(budget, Ordering::SeqCst);
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &[u8]) -> Result<Vec<u8>, StoreError> {
        self.map.read().get(key).cloned().ok_or(StoreError::NotFound)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.map.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.map.write().remove(key);
        Ok(())
    }

    fn commit_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let budget = self.fault_budget.load(Ordering::SeqCst);
        if budget != NO_FAULT && batch.len() > budget {
            self.fault_budget.store(NO_FAULT, Ordering::SeqCst);
            tracing::warn!(ops = batch.len(), budget, "failing batch commit via injected fault");
            return Err(StoreError::Backend(format!(
                "injected fault: batch of {} ops exceeds budget {}",
                batch.len(),
                budget
            )));
        }

        let mut map = self.map.write();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put(key, value) => {
                    map.insert(key, value);
                }
                BatchOp::Delete(key) => {
                    map.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_> {
        let map = self.map.read();
        let pairs: Vec<(Vec<u8>, Vec<u8>)> = match (prefix.is_empty(), next_prefix(prefix)) {
            (true, _) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            (false, Some(end)) => map
                .range(prefix.to_vec()..end)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            (false, None) => map
                .range(prefix.to_vec()..)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };
        Box::new(pairs.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_put_delete() {
        let kv = MemoryKv::new();
        assert!(matches!(kv.get(b"k"), Err(StoreError::NotFound)));

        kv.put(b"k", b"v").unwrap();
        assert_eq!(kv.get(b"k").unwrap(), b"v");

        kv.delete(b"k").unwrap();
        assert!(matches!(kv.get(b"k"), Err(StoreError::NotFound)));
        // deleting again is fine
        kv.delete(b"k").unwrap();
    }

    #[test]
    fn test_batch_atomic() {
        let kv = MemoryKv::new();
        kv.put(b"old", b"1").unwrap();

        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        batch.delete(b"old".to_vec());
        kv.commit_batch(batch).unwrap();

        assert_eq!(kv.get(b"a").unwrap(), b"1");
        assert_eq!(kv.get(b"b").unwrap(), b"2");
        assert!(!kv.contains(b"old").unwrap());
    }

    #[test]
    fn test_injected_fault_applies_nothing() {
        let kv = MemoryKv::new();
        kv.inject_batch_fault(1);

        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        assert!(kv.commit_batch(batch).is_err());

        assert!(kv.is_empty());

        // fault is one-shot
        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        kv.commit_batch(batch).unwrap();
        assert_eq!(kv.len(), 2);
    }

    #[test]
    fn test_iter_prefix_scoped_and_ordered() {
        let kv = MemoryKv::new();
        kv.put(&[0x01, 0x02], b"a").unwrap();
        kv.put(&[0x01, 0x01], b"b").unwrap();
        kv.put(&[0x02, 0x00], b"c").unwrap();
        kv.put(&[0x00, 0xFF], b"d").unwrap();

        let hits: Vec<_> = kv.iter_prefix(&[0x01]).collect();
        assert_eq!(
            hits,
            vec![
                (vec![0x01, 0x01], b"b".to_vec()),
                (vec![0x01, 0x02], b"a".to_vec()),
            ]
        );
    }

    #[test]
    fn test_iter_prefix_at_0xff_boundary() {
        let kv = MemoryKv::new();
        kv.put(&[0xFF, 0x01], b"a").unwrap();
        kv.put(&[0xFE, 0xFF], b"b").unwrap();

        let hits: Vec<_> = kv.iter_prefix(&[0xFF]).collect();
        assert_eq!(hits, vec![(vec![0xFF, 0x01], b"a".to_vec())]);
    }

    #[test]
    fn test_iter_empty_prefix_is_full_scan() {
        let kv = MemoryKv::new();
        kv.put(b"x", b"1").unwrap();
        kv.put(b"y", b"2").unwrap();
        assert_eq!(kv.iter_prefix(&[]).count(), 2);
    }
}
