//! Overlay cache for pending state mutations.
//!
//! Reads check the overlay first and fall through to the durable store,
//! caching the decoded value; writes stay in the overlay until
//! [`StateStore::commit_to`] drains the change set into a write batch and
//! the staged state tree. One overlay instance covers one block's worth of
//! state transitions and is single-writer by construction (`&mut self`).

use crate::states::StateValue;
use crate::trie::StagedStateTree;
use crate::LedgerError;
use chainloom_storage::{DataEntryPrefix, KvStore, StoreError, WriteBatch};
use std::collections::BTreeMap;

/// Dirtiness of one overlay entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Read-cached only; never written back.
    None,
    /// Mutated (or created); serialized to the store on commit.
    Changed,
    /// Deleted; removed from the store (and tree) on commit.
    Deleted,
}

/// One overlay entry.
#[derive(Debug)]
pub struct StateItem {
    /// The cached or pending value. Meaningless once `state` is `Deleted`.
    pub value: StateValue,
    /// Dirtiness tag.
    pub state: ItemState,
    /// Whether commits mirror this key into the state hash tree.
    pub trie: bool,
}

type OverlayKey = (u8, Vec<u8>);

/// Read-through, write-back overlay over the durable state region.
pub struct StateStore<'a> {
    kv: &'a dyn KvStore,
    overlay: BTreeMap<OverlayKey, StateItem>,
}

impl<'a> StateStore<'a> {
    /// Fresh overlay over the durable store.
    pub fn new(kv: &'a dyn KvStore) -> Self {
        Self {
            kv,
            overlay: BTreeMap::new(),
        }
    }

    /// Number of overlay entries (read-cached and dirty).
    pub fn len(&self) -> usize {
        self.overlay.len()
    }

    /// Whether the overlay holds no entries.
    pub fn is_empty(&self) -> bool {
        self.overlay.is_empty()
    }

    fn full_key(prefix: DataEntryPrefix, key: &[u8]) -> Vec<u8> {
        prefix.key(key)
    }

    /// Load a key into the overlay as a read-cache entry if it is neither
    /// cached nor dirty yet. Returns whether the overlay now holds it.
    fn ensure_loaded(&mut self, prefix: DataEntryPrefix, key: &[u8]) -> Result<bool, LedgerError> {
        let overlay_key = (prefix.byte(), key.to_vec());
        if self.overlay.contains_key(&overlay_key) {
            return Ok(true);
        }
        match self.kv.get(&Self::full_key(prefix, key)) {
            Ok(bytes) => {
                let value = StateValue::decode(prefix, &bytes)?;
                self.overlay.insert(
                    overlay_key,
                    StateItem {
                        value,
                        state: ItemState::None,
                        trie: false,
                    },
                );
                Ok(true)
            }
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Read a state value. Deleted entries read as absent.
    pub fn try_get(
        &mut self,
        prefix: DataEntryPrefix,
        key: &[u8],
    ) -> Result<Option<&StateValue>, LedgerError> {
        if !self.ensure_loaded(prefix, key)? {
            return Ok(None);
        }
        let item = &self.overlay[&(prefix.byte(), key.to_vec())];
        Ok(match item.state {
            ItemState::Deleted => None,
            _ => Some(&item.value),
        })
    }

    /// Read a state value and mark it dirty: the returned reference is the
    /// object that will be serialized on commit, so in-place mutation is
    /// the write.
    pub fn try_get_and_change(
        &mut self,
        prefix: DataEntryPrefix,
        key: &[u8],
        trie: bool,
    ) -> Result<Option<&mut StateValue>, LedgerError> {
        if !self.ensure_loaded(prefix, key)? {
            return Ok(None);
        }
        let item = self
            .overlay
            .get_mut(&(prefix.byte(), key.to_vec()))
            .expect("ensure_loaded inserted the entry");
        match item.state {
            ItemState::Deleted => Ok(None),
            ItemState::None => {
                // Promoting a read-cache entry fixes its trie flag.
                item.state = ItemState::Changed;
                item.trie = trie;
                Ok(Some(&mut item.value))
            }
            ItemState::Changed => {
                if item.trie != trie {
                    return Err(LedgerError::TrieFlagConflict {
                        prefix: prefix.byte(),
                    });
                }
                Ok(Some(&mut item.value))
            }
        }
    }

    /// Insert or overwrite a value as dirty.
    pub fn try_add(
        &mut self,
        prefix: DataEntryPrefix,
        key: &[u8],
        value: StateValue,
        trie: bool,
    ) -> Result<(), LedgerError> {
        let overlay_key = (prefix.byte(), key.to_vec());
        if let Some(existing) = self.overlay.get(&overlay_key) {
            // A key's trie flag is fixed for the whole batch once dirty.
            if existing.state == ItemState::Changed && existing.trie != trie {
                return Err(LedgerError::TrieFlagConflict {
                    prefix: prefix.byte(),
                });
            }
        }
        self.overlay.insert(
            overlay_key,
            StateItem {
                value,
                state: ItemState::Changed,
                trie,
            },
        );
        Ok(())
    }

    /// Insert only if the key is absent from both the overlay (as
    /// non-deleted) and the durable store.
    pub fn try_get_or_add(
        &mut self,
        prefix: DataEntryPrefix,
        key: &[u8],
        value: StateValue,
        trie: bool,
    ) -> Result<(), LedgerError> {
        let overlay_key = (prefix.byte(), key.to_vec());
        if let Some(existing) = self.overlay.get(&overlay_key) {
            if existing.state != ItemState::Deleted {
                return Ok(());
            }
            return self.try_add(prefix, key, value, trie);
        }
        if self.kv.contains(&Self::full_key(prefix, key))? {
            return Ok(());
        }
        self.try_add(prefix, key, value, trie)
    }

    /// Mark a key deleted. The durable record goes away on commit; the
    /// state tree leaf is removed regardless of how the key was tracked.
    pub fn try_delete(&mut self, prefix: DataEntryPrefix, key: &[u8]) {
        let overlay_key = (prefix.byte(), key.to_vec());
        match self.overlay.get_mut(&overlay_key) {
            Some(item) => item.state = ItemState::Deleted,
            None => {
                self.overlay.insert(
                    overlay_key,
                    StateItem {
                        // Placeholder; deleted entries never serialize.
                        value: StateValue::Storage(crate::states::StorageItem::default()),
                        state: ItemState::Deleted,
                        trie: false,
                    },
                );
            }
        }
    }

    /// All live values whose key starts with `key_prefix` under `prefix`:
    /// the durable records overridden by overlay state, plus overlay-only
    /// additions.
    pub fn find(
        &self,
        prefix: DataEntryPrefix,
        key_prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, StateValue)>, LedgerError> {
        let scan_prefix = Self::full_key(prefix, key_prefix);
        let mut results: BTreeMap<Vec<u8>, StateValue> = BTreeMap::new();

        for (full_key, bytes) in self.kv.iter_prefix(&scan_prefix) {
            let key = full_key[1..].to_vec();
            if self.overlay.contains_key(&(prefix.byte(), key.clone())) {
                continue;
            }
            results.insert(key, StateValue::decode(prefix, &bytes)?);
        }

        for ((p, key), item) in &self.overlay {
            if *p != prefix.byte() || !key.starts_with(key_prefix) {
                continue;
            }
            if item.state == ItemState::Deleted {
                continue;
            }
            results.insert(key.clone(), item.value.clone());
        }

        Ok(results.into_iter().collect())
    }

    /// Drain the change set into `batch` and `staged`, clearing the
    /// overlay. Read-cache entries are dropped untouched.
    pub fn commit_to(
        &mut self,
        batch: &mut WriteBatch,
        staged: &mut StagedStateTree,
    ) -> Result<(), LedgerError> {
        for ((prefix_byte, key), item) in std::mem::take(&mut self.overlay) {
            let mut full_key = Vec::with_capacity(1 + key.len());
            full_key.push(prefix_byte);
            full_key.extend_from_slice(&key);

            match item.state {
                ItemState::None => {}
                ItemState::Deleted => {
                    staged.delete(&full_key, batch);
                    batch.delete(full_key);
                }
                ItemState::Changed => {
                    let bytes = item.value.encode_bytes();
                    if item.trie {
                        staged.update(&full_key, item.value.content_hash(), batch);
                    }
                    batch.put(full_key, bytes);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states::{AccountState, StorageItem};
    use crate::trie::StateHashTree;
    use chainloom_storage::MemoryKv;
    use chainloom_types::{Address, Amount, Hash};

    fn account(n: u8, balance: i64) -> StateValue {
        StateValue::Account(AccountState::with_balance(
            Address::from_program(&[n]),
            Hash::digest(b"asset"),
            Amount::from_whole(balance),
        ))
    }

    fn addr_key(n: u8) -> Vec<u8> {
        Address::from_program(&[n]).as_bytes().to_vec()
    }

    #[test]
    fn test_read_through_caches_as_clean() {
        let kv = MemoryKv::new();
        let key = addr_key(1);
        kv.put(
            &DataEntryPrefix::StAccount.key(&key),
            &account(1, 5).encode_bytes(),
        )
        .unwrap();

        let mut store = StateStore::new(&kv);
        let value = store
            .try_get(DataEntryPrefix::StAccount, &key)
            .unwrap()
            .unwrap();
        assert_eq!(*value, account(1, 5));
        assert_eq!(store.len(), 1);

        // Clean entries are not written back.
        let tree = StateHashTree::new();
        let mut staged = tree.stage();
        let mut batch = WriteBatch::new();
        store.commit_to(&mut batch, &mut staged).unwrap();
        assert!(batch.is_empty());
    }

    #[test]
    fn test_get_and_change_then_commit_round_trips_durably() {
        let kv = MemoryKv::new();
        let key = addr_key(1);
        let full_key = DataEntryPrefix::StAccount.key(&key);
        kv.put(&full_key, &account(1, 5).encode_bytes()).unwrap();

        let mut store = StateStore::new(&kv);
        let asset = Hash::digest(b"asset");
        store
            .try_get_and_change(DataEntryPrefix::StAccount, &key, false)
            .unwrap()
            .unwrap()
            .as_account_mut()
            .unwrap()
            .credit(asset, Amount::from_whole(2));

        let tree = StateHashTree::new();
        let mut staged = tree.stage();
        let mut batch = WriteBatch::new();
        store.commit_to(&mut batch, &mut staged).unwrap();
        kv.commit_batch(batch).unwrap();

        // Bypassing the overlay, the durable bytes carry the mutation.
        let durable = StateValue::decode(DataEntryPrefix::StAccount, &kv.get(&full_key).unwrap())
            .unwrap();
        assert_eq!(
            durable.as_account().unwrap().balance(&asset),
            Amount::from_whole(7)
        );
    }

    #[test]
    fn test_delete_then_commit_removes_durably() {
        let kv = MemoryKv::new();
        let key = addr_key(2);
        let full_key = DataEntryPrefix::StAccount.key(&key);
        kv.put(&full_key, &account(2, 5).encode_bytes()).unwrap();

        let mut store = StateStore::new(&kv);
        store.try_delete(DataEntryPrefix::StAccount, &key);
        assert!(store
            .try_get(DataEntryPrefix::StAccount, &key)
            .unwrap()
            .is_none());

        let tree = StateHashTree::new();
        let mut staged = tree.stage();
        let mut batch = WriteBatch::new();
        store.commit_to(&mut batch, &mut staged).unwrap();
        kv.commit_batch(batch).unwrap();

        assert!(matches!(kv.get(&full_key), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_try_get_or_add_only_fills_gaps() {
        let kv = MemoryKv::new();
        let key = addr_key(3);
        let mut store = StateStore::new(&kv);

        store
            .try_get_or_add(DataEntryPrefix::StAccount, &key, account(3, 1), false)
            .unwrap();
        // Second add is a no-op.
        store
            .try_get_or_add(DataEntryPrefix::StAccount, &key, account(3, 99), false)
            .unwrap();
        let value = store
            .try_get(DataEntryPrefix::StAccount, &key)
            .unwrap()
            .unwrap();
        assert_eq!(*value, account(3, 1));

        // But a deleted entry can be re-added.
        store.try_delete(DataEntryPrefix::StAccount, &key);
        store
            .try_get_or_add(DataEntryPrefix::StAccount, &key, account(3, 7), false)
            .unwrap();
        let value = store
            .try_get(DataEntryPrefix::StAccount, &key)
            .unwrap()
            .unwrap();
        assert_eq!(*value, account(3, 7));
    }

    #[test]
    fn test_trie_flag_conflict_rejected() {
        let kv = MemoryKv::new();
        let key = addr_key(4);
        let mut store = StateStore::new(&kv);
        store
            .try_add(DataEntryPrefix::StAccount, &key, account(4, 1), true)
            .unwrap();

        let err = store
            .try_get_and_change(DataEntryPrefix::StAccount, &key, false)
            .unwrap_err();
        assert!(matches!(err, LedgerError::TrieFlagConflict { .. }));

        let err = store
            .try_add(DataEntryPrefix::StAccount, &key, account(4, 2), false)
            .unwrap_err();
        assert!(matches!(err, LedgerError::TrieFlagConflict { .. }));
    }

    #[test]
    fn test_trie_tracked_commit_updates_tree_and_delete_removes_leaf() {
        let kv = MemoryKv::new();
        let key = addr_key(5);
        let mut tree = StateHashTree::new();

        let mut store = StateStore::new(&kv);
        store
            .try_add(DataEntryPrefix::StAccount, &key, account(5, 1), true)
            .unwrap();
        let mut staged = tree.stage();
        let mut batch = WriteBatch::new();
        store.commit_to(&mut batch, &mut staged).unwrap();
        kv.commit_batch(batch).unwrap();
        let root_after_add = staged.root();
        tree.apply(staged);
        assert_ne!(root_after_add, Hash::ZERO);
        assert_eq!(tree.len(), 1);

        let mut store = StateStore::new(&kv);
        store.try_delete(DataEntryPrefix::StAccount, &key);
        let mut staged = tree.stage();
        let mut batch = WriteBatch::new();
        store.commit_to(&mut batch, &mut staged).unwrap();
        kv.commit_batch(batch).unwrap();
        tree.apply(staged);
        assert_eq!(tree.root(), Hash::ZERO);
        assert!(kv
            .iter_prefix(&[DataEntryPrefix::SysStateTreeLeaf.byte()])
            .next()
            .is_none());
    }

    #[test]
    fn test_find_merges_overlay_and_durable() {
        let kv = MemoryKv::new();
        let durable_key = b"aa-durable".to_vec();
        kv.put(
            &DataEntryPrefix::StStorage.key(&durable_key),
            &StateValue::Storage(StorageItem { value: vec![1] }).encode_bytes(),
        )
        .unwrap();
        let shadowed_key = b"aa-shadowed".to_vec();
        kv.put(
            &DataEntryPrefix::StStorage.key(&shadowed_key),
            &StateValue::Storage(StorageItem { value: vec![2] }).encode_bytes(),
        )
        .unwrap();

        let mut store = StateStore::new(&kv);
        store
            .try_add(
                DataEntryPrefix::StStorage,
                b"aa-pending",
                StateValue::Storage(StorageItem { value: vec![3] }),
                false,
            )
            .unwrap();
        store.try_delete(DataEntryPrefix::StStorage, &shadowed_key);

        let found = store.find(DataEntryPrefix::StStorage, b"aa-").unwrap();
        let keys: Vec<&[u8]> = found.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![b"aa-durable".as_slice(), b"aa-pending"]);
    }
}
