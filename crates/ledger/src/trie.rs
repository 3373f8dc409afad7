//! State hash tree.
//!
//! Cryptographic commitment over the trie-tracked state: a sorted map of
//! state key → value content hash, with the root computed as a binary
//! merkle fold over the sorted leaves. Leaves are mirrored into durable
//! records so the tree rebuilds on open without replaying blocks.
//!
//! Mutations are staged against a copy and only applied to the live tree
//! after the batch carrying the leaf records commits, so the in-memory
//! tree never runs ahead of the durable store.

use crate::LedgerError;
use chainloom_storage::{keys, DataEntryPrefix, KvStore, WriteBatch};
use chainloom_types::{compute_merkle_root, Hash};
use std::collections::BTreeMap;

fn leaves_root(leaves: &BTreeMap<Vec<u8>, Hash>) -> Hash {
    let leaf_hashes: Vec<Hash> = leaves
        .iter()
        .map(|(key, value_hash)| Hash::digest_parts(&[key, value_hash.as_bytes()]))
        .collect();
    compute_merkle_root(&leaf_hashes)
}

/// The live state commitment tree.
#[derive(Debug, Default)]
pub struct StateHashTree {
    leaves: BTreeMap<Vec<u8>, Hash>,
}

impl StateHashTree {
    /// Empty tree (fresh database).
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from durable leaf records.
    pub fn open(kv: &dyn KvStore) -> Result<Self, LedgerError> {
        let prefix = [DataEntryPrefix::SysStateTreeLeaf.byte()];
        let mut leaves = BTreeMap::new();
        for (key, value) in kv.iter_prefix(&prefix) {
            let state_key = key[prefix.len()..].to_vec();
            let value_hash = Hash::from_slice(&value).map_err(|_| {
                LedgerError::CorruptChain(format!(
                    "state tree leaf for key {} is not a hash",
                    hex_preview(&state_key)
                ))
            })?;
            leaves.insert(state_key, value_hash);
        }
        Ok(Self { leaves })
    }

    /// Number of tracked leaves.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether the tree tracks no state.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Current commitment root. `Hash::ZERO` for an empty tree.
    pub fn root(&self) -> Hash {
        leaves_root(&self.leaves)
    }

    /// Begin staging one batch of mutations.
    pub fn stage(&self) -> StagedStateTree {
        StagedStateTree {
            leaves: self.leaves.clone(),
        }
    }

    /// Adopt a staged tree after its batch committed durably.
    pub fn apply(&mut self, staged: StagedStateTree) {
        self.leaves = staged.leaves;
    }
}

/// Pending mutations against a [`StateHashTree`], discarded on drop if the
/// owning batch never commits.
#[derive(Debug)]
pub struct StagedStateTree {
    leaves: BTreeMap<Vec<u8>, Hash>,
}

impl StagedStateTree {
    /// Upsert a leaf and queue its durable record.
    pub fn update(&mut self, state_key: &[u8], value_hash: Hash, batch: &mut WriteBatch) {
        self.leaves.insert(state_key.to_vec(), value_hash);
        batch.put(
            keys::state_tree_leaf_key(state_key),
            value_hash.as_bytes().to_vec(),
        );
    }

    /// Remove a leaf (absent keys are fine) and queue the record delete.
    pub fn delete(&mut self, state_key: &[u8], batch: &mut WriteBatch) {
        if self.leaves.remove(state_key).is_some() {
            batch.delete(keys::state_tree_leaf_key(state_key));
        }
    }

    /// Root after the staged mutations.
    pub fn root(&self) -> Hash {
        leaves_root(&self.leaves)
    }
}

fn hex_preview(bytes: &[u8]) -> String {
    let take = bytes.len().min(8);
    let mut out = String::with_capacity(take * 2 + 2);
    for b in &bytes[..take] {
        out.push_str(&format!("{b:02x}"));
    }
    if bytes.len() > take {
        out.push_str("..");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainloom_storage::MemoryKv;

    #[test]
    fn test_empty_root_is_zero() {
        assert_eq!(StateHashTree::new().root(), Hash::ZERO);
    }

    #[test]
    fn test_root_changes_with_updates_and_deletes() {
        let kv = MemoryKv::new();
        let mut tree = StateHashTree::new();

        let mut batch = WriteBatch::new();
        let mut staged = tree.stage();
        staged.update(b"key-a", Hash::digest(b"v1"), &mut batch);
        let root_a = staged.root();
        kv.commit_batch(batch).unwrap();
        tree.apply(staged);
        assert_eq!(tree.root(), root_a);
        assert_ne!(root_a, Hash::ZERO);

        let mut batch = WriteBatch::new();
        let mut staged = tree.stage();
        staged.update(b"key-a", Hash::digest(b"v2"), &mut batch);
        let root_b = staged.root();
        kv.commit_batch(batch).unwrap();
        tree.apply(staged);
        assert_ne!(root_a, root_b);

        let mut batch = WriteBatch::new();
        let mut staged = tree.stage();
        staged.delete(b"key-a", &mut batch);
        kv.commit_batch(batch).unwrap();
        tree.apply(staged);
        assert_eq!(tree.root(), Hash::ZERO);
    }

    #[test]
    fn test_staging_leaves_live_tree_untouched() {
        let tree = StateHashTree::new();
        let mut batch = WriteBatch::new();
        let mut staged = tree.stage();
        staged.update(b"key", Hash::digest(b"value"), &mut batch);
        // Batch never committed; staged dropped.
        drop(staged);
        drop(batch);
        assert_eq!(tree.root(), Hash::ZERO);
    }

    #[test]
    fn test_reopen_restores_root() {
        let kv = MemoryKv::new();
        let mut tree = StateHashTree::new();

        let mut batch = WriteBatch::new();
        let mut staged = tree.stage();
        staged.update(b"alpha", Hash::digest(b"1"), &mut batch);
        staged.update(b"beta", Hash::digest(b"2"), &mut batch);
        let expected = staged.root();
        kv.commit_batch(batch).unwrap();
        tree.apply(staged);

        let reopened = StateHashTree::open(&kv).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.root(), expected);
    }

    #[test]
    fn test_root_independent_of_insertion_order() {
        let mut batch = WriteBatch::new();
        let tree = StateHashTree::new();
        let mut a = tree.stage();
        a.update(b"x", Hash::digest(b"1"), &mut batch);
        a.update(b"y", Hash::digest(b"2"), &mut batch);

        let mut b = tree.stage();
        b.update(b"y", Hash::digest(b"2"), &mut batch);
        b.update(b"x", Hash::digest(b"1"), &mut batch);

        assert_eq!(a.root(), b.root());
    }
}
