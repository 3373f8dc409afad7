//! Durable chain storage.
//!
//! The chain store owns the header index (height → hash), the in-memory
//! caches for blocks and headers pending persistence, and the persist
//! pipeline that turns an accepted block into one atomic batch of durable
//! writes: header record, height index, transaction bodies, unspent-set
//! deltas, state transitions, commitment roots, and the current-block
//! pointer.
//!
//! Sequencing is two-phase: headers commit first (`add_headers`, or block
//! admission when the block is the next height), then a dedicated writer
//! thread drains cached block bodies strictly in height order. `save_block`
//! returns a [`PersistHandle`] so callers can observe when their block
//! actually became durable.
//!
//! One coarse read-write lock guards the in-memory maps; write paths hold
//! it across the underlying batch commit, serializing durable I/O with
//! index mutation. The owning ledger actor is the only writer in practice,
//! so the lock is a safety net against the writer thread racing a caller.

use crate::events::BlockPersisted;
use crate::merkle::CompactMerkleTree;
use crate::state_store::StateStore;
use crate::states::{
    AccountState, AssetState, BookKeeperState, ContractState, ProgramCoin, ProgramUnspentCoin,
    SpentCoinItem, SpentCoinState, StateValue, StorageItem, UnspentCoinState, ValidatorState,
    VoteState,
};
use crate::trie::StateHashTree;
use crate::LedgerError;
use chainloom_actor::EventStream;
use chainloom_storage::keys::{
    block_hash_key, block_merkle_tree_key, current_block_key, current_header_key,
    header_hash_list_key, header_key, program_coin_suffix, spent_coin_key, state_root_key,
    transaction_key, unspent_key, version_key,
};
use chainloom_storage::{DataEntryPrefix, KvStore, StoreError, WriteBatch};
use chainloom_types::{
    Address, Amount, Block, ByteReader, ByteWriter, Decodable, Encodable, Hash, Header,
    Transaction, TrimmedBlock, TxOutput, TxPayload,
};
use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Headers per durable header-hash-list chunk.
pub const HEADER_HASH_LIST_COUNT: u32 = 2000;

/// Cached blocks/headers this far below the current height are evicted.
const CLEAN_CACHE_THRESHOLD: u32 = 2;

/// Schema version written once the store is initialized.
const CURRENT_SCHEMA_VERSION: u8 = 0x01;

/// Sysfee placeholder marking a record that carries a full block body,
/// distinguishing it from header-only records (which carry 0).
const BLOCK_SYSFEE_SENTINEL: u64 = u64::MAX;

/// Key suffix of the singleton bookkeeper record.
const BOOKKEEPER_KEY: &[u8] = b"bookkeepers";

/// Verification seam for header and block checks beyond chain linkage.
///
/// Signature and consensus-data verification belong to the crypto layer
/// and plug in here; the default implementation performs the structural
/// checks the store itself owns.
pub trait HeaderVerifier: Send + Sync {
    /// Check a header against its resolved predecessor.
    fn verify_header(&self, header: &Header, prev: &Header) -> Result<(), String>;

    /// Check a full block body.
    fn verify_block(&self, block: &Block) -> Result<(), String>;
}

/// Default verifier: height succession, timestamp monotonicity, and
/// transaction-root integrity.
pub struct StructuralVerifier;

impl HeaderVerifier for StructuralVerifier {
    fn verify_header(&self, header: &Header, prev: &Header) -> Result<(), String> {
        if prev.height + 1 != header.height {
            return Err(format!(
                "height {} does not follow previous height {}",
                header.height, prev.height
            ));
        }
        if prev.timestamp >= header.timestamp {
            return Err("timestamp does not strictly increase".to_string());
        }
        Ok(())
    }

    fn verify_block(&self, block: &Block) -> Result<(), String> {
        if block.header.tx_root != block.compute_tx_root() {
            return Err("transaction root does not match the transaction list".to_string());
        }
        Ok(())
    }
}

/// Completion signal for one `save_block` call.
///
/// Resolves once the block's height is durably persisted (or the persist
/// failed). Dropping the handle is fine for callers that do not need the
/// durability guarantee.
#[derive(Debug)]
pub struct PersistHandle {
    rx: crossbeam_channel::Receiver<Result<(), String>>,
}

impl PersistHandle {
    fn resolved() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let _ = tx.send(Ok(()));
        Self { rx }
    }

    /// Block until the save is durable, failed, or `timeout` elapsed.
    pub fn wait(&self, timeout: Duration) -> Result<(), LedgerError> {
        match self.rx.recv_timeout(timeout) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(LedgerError::PersistFailed(reason)),
            Err(RecvTimeoutError::Timeout) => Err(LedgerError::PersistTimeout),
            Err(RecvTimeoutError::Disconnected) => Err(LedgerError::Closed),
        }
    }
}

/// One output still claimable after being spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimableCoin {
    /// The spent output.
    pub output: TxOutput,
    /// Height the output was created at.
    pub start_height: u32,
    /// Height the output was consumed at.
    pub end_height: u32,
}

enum WriterTask {
    Drain,
}

struct ChainState {
    /// Contiguous run of header hashes for heights `[0, len)`.
    header_index: Vec<Hash>,
    /// Blocks accepted but not yet durable, keyed by hash.
    block_cache: HashMap<Hash, Block>,
    /// Headers admitted in the current batch, cleared when the call ends.
    header_cache: HashMap<Hash, Header>,
    current_block_height: u32,
    /// Heights `[0, stored_header_count)` are durably chunked.
    stored_header_count: u32,
    /// Pending persist completions, by height.
    waiters: Vec<(u32, Sender<Result<(), String>>)>,
}

struct ChainInner {
    kv: Arc<dyn KvStore>,
    state: RwLock<ChainState>,
    merkle: Mutex<CompactMerkleTree>,
    trie: Mutex<StateHashTree>,
    events: EventStream,
    verifier: Box<dyn HeaderVerifier>,
}

/// The durable ledger store.
pub struct ChainStore {
    inner: Arc<ChainInner>,
    task_tx: Option<Sender<WriterTask>>,
    writer: Option<JoinHandle<()>>,
}

impl ChainStore {
    /// Open a chain store over `kv` with the structural verifier.
    ///
    /// The store starts empty; call
    /// [`init_with_genesis`](Self::init_with_genesis) before use.
    pub fn new(kv: Arc<dyn KvStore>, events: EventStream) -> Self {
        Self::with_verifier(kv, events, Box::new(StructuralVerifier))
    }

    /// Open with a custom verification seam.
    pub fn with_verifier(
        kv: Arc<dyn KvStore>,
        events: EventStream,
        verifier: Box<dyn HeaderVerifier>,
    ) -> Self {
        let inner = Arc::new(ChainInner {
            kv,
            state: RwLock::new(ChainState {
                header_index: Vec::new(),
                block_cache: HashMap::new(),
                header_cache: HashMap::new(),
                current_block_height: 0,
                stored_header_count: 0,
                waiters: Vec::new(),
            }),
            merkle: Mutex::new(CompactMerkleTree::new()),
            trie: Mutex::new(StateHashTree::new()),
            events,
            verifier,
        });

        let (task_tx, task_rx) = crossbeam_channel::unbounded();
        let writer_inner = Arc::clone(&inner);
        let writer = std::thread::Builder::new()
            .name("chain-writer".to_string())
            .spawn(move || {
                for WriterTask::Drain in task_rx {
                    Self::drain(&writer_inner);
                }
            })
            .expect("failed to spawn chain writer thread");

        Self {
            inner,
            task_tx: Some(task_tx),
            writer: Some(writer),
        }
    }

    /// Shut down the writer thread after draining queued work.
    pub fn close(&mut self) {
        self.task_tx = None;
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }

    // ── boot ────────────────────────────────────────────────────────────

    /// Initialize against `genesis`.
    ///
    /// A fresh (or unversioned) database is wiped, the genesis block is
    /// persisted as bootstrap, and the schema version stamped. An already
    /// initialized database has its header index rebuilt from the chunk
    /// table, from a full height-index scan when no chunks exist yet, or
    /// by walking `prev_block_hash` backward from the current header when
    /// headers outpaced the chunks. Returns the recovered header height.
    /// Any read failure during recovery is fatal.
    pub fn init_with_genesis(
        &self,
        genesis: &Block,
        bookkeepers: &[Address],
    ) -> Result<u32, LedgerError> {
        let mut state = self.inner.state.write();
        let kv = self.inner.kv.as_ref();
        let genesis_hash = genesis.hash();

        let version = match kv.get(&version_key()) {
            Ok(bytes) => bytes.first().copied().unwrap_or(0),
            Err(StoreError::NotFound) => 0,
            Err(e) => return Err(e.into()),
        };

        if version != CURRENT_SCHEMA_VERSION {
            return self.bootstrap(&mut state, genesis, bookkeepers);
        }

        // The stored chain must have been built from this genesis.
        match kv.get(&header_key(&genesis_hash)) {
            Ok(_) => {}
            Err(StoreError::NotFound) => {
                return Err(LedgerError::CorruptChain(
                    "genesis block does not match the stored chain".into(),
                ))
            }
            Err(e) => return Err(e.into()),
        }

        let current_bytes = kv.get(&current_block_key())?;
        let mut r = ByteReader::new(&current_bytes);
        let current_hash = Hash::decode(&mut r)?;
        let current_height = r.read_u32_le()?;

        // Fast path: rebuild from durable header-hash-list chunks.
        state.header_index.clear();
        for (key, value) in kv.iter_prefix(&[DataEntryPrefix::IxHeaderHashList.byte()]) {
            let mut rk = ByteReader::new(&key[1..]);
            let start = rk.read_u32_be()?;
            if start != state.header_index.len() as u32 {
                return Err(LedgerError::CorruptChain(format!(
                    "header hash chunk starts at {start}, expected {}",
                    state.header_index.len()
                )));
            }
            let mut rv = ByteReader::new(&value);
            let count = rv.read_var_uint()?;
            for _ in 0..count {
                state.header_index.push(Hash::decode(&mut rv)?);
            }
        }
        state.stored_header_count = state.header_index.len() as u32;

        if state.stored_header_count == 0 {
            // Fallback: scan the height→hash table. Keys are little-endian,
            // so collect by height before checking contiguity.
            let mut by_height = BTreeMap::new();
            for (key, value) in kv.iter_prefix(&[DataEntryPrefix::DataBlockHash.byte()]) {
                let mut rk = ByteReader::new(&key[1..]);
                let height = rk.read_u32_le()?;
                by_height.insert(height, Hash::from_slice(&value)?);
            }
            for (height, hash) in by_height {
                if height != state.header_index.len() as u32 {
                    return Err(LedgerError::CorruptChain(format!(
                        "height index has a gap at {height}"
                    )));
                }
                state.header_index.push(hash);
            }
        }

        // Recovery path: headers beyond the chunked range are recovered by
        // walking backward from the current header pointer.
        let (header_hash, header_height) = match kv.get(&current_header_key()) {
            Ok(bytes) => {
                let mut r = ByteReader::new(&bytes);
                (Hash::decode(&mut r)?, r.read_u32_le()?)
            }
            Err(StoreError::NotFound) => (current_hash, current_height),
            Err(e) => return Err(e.into()),
        };
        let base = state.header_index.len() as u32;
        if header_height + 1 > base {
            let mut pending = Vec::with_capacity((header_height + 1 - base) as usize);
            let mut cursor = header_hash;
            let mut height = header_height;
            loop {
                let (_, trimmed) = self.read_header_record(&cursor)?;
                if trimmed.header.height != height {
                    return Err(LedgerError::CorruptChain(format!(
                        "header {cursor} claims height {}, walk expected {height}",
                        trimmed.header.height
                    )));
                }
                pending.push(cursor);
                if height == base {
                    break;
                }
                cursor = trimmed.header.prev_block_hash;
                height -= 1;
            }
            pending.reverse();
            state.header_index.extend(pending);
        }

        if (current_height as usize) >= state.header_index.len() {
            return Err(LedgerError::CorruptChain(format!(
                "current block height {current_height} exceeds the recovered header index"
            )));
        }
        if state.header_index[current_height as usize] != current_hash {
            return Err(LedgerError::CorruptChain(
                "current block pointer disagrees with the header index".into(),
            ));
        }
        state.current_block_height = current_height;

        let blob = kv.get(&block_merkle_tree_key())?;
        let merkle = CompactMerkleTree::from_blob(&blob)?;
        if merkle.size() != current_height + 1 {
            return Err(LedgerError::CorruptChain(format!(
                "block merkle size {} inconsistent with height {current_height}",
                merkle.size()
            )));
        }
        *self.inner.merkle.lock() = merkle;
        *self.inner.trie.lock() = StateHashTree::open(kv)?;

        Ok(state.header_index.len() as u32 - 1)
    }

    fn bootstrap(
        &self,
        state: &mut ChainState,
        genesis: &Block,
        bookkeepers: &[Address],
    ) -> Result<u32, LedgerError> {
        let kv = self.inner.kv.as_ref();

        // Wipe whatever schema the database held before.
        let mut wipe = WriteBatch::new();
        for (key, _) in kv.iter_prefix(&[]) {
            wipe.delete(key);
        }
        kv.commit_batch(wipe)?;

        *self.inner.merkle.lock() = CompactMerkleTree::new();
        *self.inner.trie.lock() = StateHashTree::new();

        let mut members = bookkeepers.to_vec();
        members.sort();
        members.dedup();
        let book_keeper = StateValue::BookKeeper(BookKeeperState::new(members));
        kv.put(
            &DataEntryPrefix::StBookKeeper.key(BOOKKEEPER_KEY),
            &book_keeper.encode_bytes(),
        )?;

        Self::persist(&self.inner, genesis)?;

        let genesis_hash = genesis.hash();
        let mut w = ByteWriter::new();
        genesis_hash.encode(&mut w);
        w.write_u32_le(0);
        kv.put(&current_header_key(), &w.into_bytes())?;
        kv.put(&version_key(), &[CURRENT_SCHEMA_VERSION])?;

        state.header_index.clear();
        state.header_index.push(genesis_hash);
        state.current_block_height = 0;
        state.stored_header_count = 0;
        Ok(0)
    }

    // ── header ingestion ────────────────────────────────────────────────

    /// Append a batch of headers.
    ///
    /// Headers already indexed are skipped; a gap stops processing with an
    /// ordering error; a verification failure stops the batch — every
    /// header from the bad one on is dropped, since a broken link voids
    /// trust in the remainder of the ordering. Headers accepted before the
    /// failure stay accepted.
    pub fn add_headers(&self, mut headers: Vec<Header>) -> Result<(), LedgerError> {
        headers.sort_by_key(|h| h.height);
        let mut state = self.inner.state.write();
        let result = self.add_headers_locked(&mut state, headers);
        state.header_cache.clear();
        result
    }

    fn add_headers_locked(
        &self,
        state: &mut ChainState,
        headers: Vec<Header>,
    ) -> Result<(), LedgerError> {
        for header in headers {
            let expected = state.header_index.len() as u32;
            if header.height < expected {
                continue;
            }
            if header.height > expected {
                return Err(LedgerError::HeaderOutOfOrder {
                    height: header.height,
                    expected,
                });
            }
            // Genesis only enters through init_with_genesis.
            if header.height == 0 {
                continue;
            }
            self.verify_linked_header(state, &header)?;
            self.append_header(state, header)?;
        }
        Ok(())
    }

    /// Resolve the predecessor (header cache first) and verify linkage.
    fn verify_linked_header(
        &self,
        state: &ChainState,
        header: &Header,
    ) -> Result<(), LedgerError> {
        let fail = |reason: String| LedgerError::HeaderVerify {
            height: header.height,
            reason,
        };
        if state.header_index[(header.height - 1) as usize] != header.prev_block_hash {
            return Err(fail(
                "previous hash does not match the indexed chain".into(),
            ));
        }
        let prev = self
            .header_with_cache(state, &header.prev_block_hash)
            .map_err(|e| fail(format!("previous header unavailable: {e}")))?;
        self.inner
            .verifier
            .verify_header(header, &prev)
            .map_err(fail)
    }

    /// Durably append a verified header and admit it to the index.
    fn append_header(&self, state: &mut ChainState, header: Header) -> Result<(), LedgerError> {
        let hash = header.hash();
        let mut batch = WriteBatch::new();
        batch.put(
            header_key(&hash),
            encode_header_record(
                0,
                &TrimmedBlock {
                    header: header.clone(),
                    tx_hashes: Vec::new(),
                },
            ),
        );
        let mut w = ByteWriter::new();
        hash.encode(&mut w);
        w.write_u32_le(header.height);
        batch.put(current_header_key(), w.into_bytes());
        self.inner.kv.commit_batch(batch)?;

        state.header_index.push(hash);
        state.header_cache.insert(hash, header);
        Ok(())
    }

    // ── block ingestion ─────────────────────────────────────────────────

    /// Accept a block for persistence.
    ///
    /// The block must not run ahead of the header index by more than the
    /// one height it can itself supply. When it is exactly the next
    /// height, full verification runs before its header is admitted.
    /// Acceptance caches the block; the writer thread makes it durable.
    /// The returned handle resolves when that happens — acceptance alone
    /// is not a durability guarantee.
    pub fn save_block(&self, block: Block) -> Result<PersistHandle, LedgerError> {
        let hash = block.hash();
        let height = block.height();
        let mut state = self.inner.state.write();

        if state.header_index.is_empty() {
            return Err(LedgerError::CorruptChain(
                "ledger is not initialized with a genesis block".into(),
            ));
        }
        if height <= state.current_block_height {
            // Already durable (or the genesis block itself).
            return Ok(PersistHandle::resolved());
        }

        let header_height = state.header_index.len() as u32;
        let fail = |reason: String| LedgerError::BlockVerify { height, reason };
        if height > header_height {
            return Err(LedgerError::BlockAheadOfHeaders {
                height,
                header_height,
            });
        }

        if height == header_height {
            // The next block supplies its own header: verify fully, then
            // admit the header.
            self.verify_linked_header(&state, &block.header)
                .map_err(|e| fail(e.to_string()))?;
            self.inner.verifier.verify_block(&block).map_err(fail)?;
            self.append_header(&mut state, block.header.clone())?;
        } else {
            // Header already indexed; the body must match it.
            if state.header_index[height as usize] != hash {
                return Err(fail("block does not match the indexed header".into()));
            }
            self.inner.verifier.verify_block(&block).map_err(fail)?;
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        state.block_cache.insert(hash, block);
        state.waiters.push((height, tx));
        drop(state);

        let Some(task_tx) = &self.task_tx else {
            return Err(LedgerError::Closed);
        };
        if task_tx.send(WriterTask::Drain).is_err() {
            return Err(LedgerError::Closed);
        }
        Ok(PersistHandle { rx })
    }

    /// Writer-thread entry: drain cached blocks in height order, stopping
    /// at the first gap, then flush header-hash chunks and evict stale
    /// cache entries.
    fn drain(inner: &Arc<ChainInner>) {
        let mut state = inner.state.write();
        loop {
            let next = state.current_block_height + 1;
            if (next as usize) >= state.header_index.len() {
                break;
            }
            let hash = state.header_index[next as usize];
            let Some(block) = state.block_cache.get(&hash).cloned() else {
                break;
            };

            match Self::persist(inner, &block) {
                Ok(()) => {
                    state.current_block_height = next;
                    state.block_cache.remove(&hash);
                    Self::resolve_waiters(&mut state, next, None);
                    inner.events.publish(&BlockPersisted {
                        height: next,
                        hash,
                        tx_count: block.transactions.len(),
                    });
                    tracing::debug!(height = next, hash = %hash, "block persisted");
                }
                Err(e) => {
                    tracing::error!(height = next, error = %e, "failed to persist block");
                    state.block_cache.remove(&hash);
                    Self::resolve_waiters(&mut state, next, Some(e.to_string()));
                    break;
                }
            }
        }
        Self::flush_header_chunks(inner, &mut state);
        Self::clean_caches(&mut state);
    }

    fn resolve_waiters(state: &mut ChainState, height: u32, error: Option<String>) {
        let mut kept = Vec::with_capacity(state.waiters.len());
        for (waiter_height, tx) in state.waiters.drain(..) {
            let resolved = match &error {
                None => waiter_height <= height,
                Some(_) => waiter_height == height,
            };
            if resolved {
                let outcome = match &error {
                    None => Ok(()),
                    Some(reason) => Err(reason.clone()),
                };
                let _ = tx.send(outcome);
            } else {
                kept.push((waiter_height, tx));
            }
        }
        state.waiters = kept;
    }

    /// Checkpoint fully persisted header ranges into fixed-size chunks so
    /// a restart rebuilds the index without scanning every block.
    fn flush_header_chunks(inner: &ChainInner, state: &mut ChainState) {
        let mut batch = WriteBatch::new();
        let mut stored = state.stored_header_count;
        while state.current_block_height >= stored + HEADER_HASH_LIST_COUNT {
            let mut w = ByteWriter::new();
            w.write_var_uint(HEADER_HASH_LIST_COUNT as u64);
            for i in 0..HEADER_HASH_LIST_COUNT {
                state.header_index[(stored + i) as usize].encode(&mut w);
            }
            batch.put(header_hash_list_key(stored), w.into_bytes());
            stored += HEADER_HASH_LIST_COUNT;
        }
        if batch.is_empty() {
            return;
        }
        match inner.kv.commit_batch(batch) {
            Ok(()) => state.stored_header_count = stored,
            Err(e) => tracing::error!(error = %e, "failed to persist header hash chunks"),
        }
    }

    fn clean_caches(state: &mut ChainState) {
        let current = state.current_block_height;
        state
            .header_cache
            .retain(|_, header| header.height + CLEAN_CACHE_THRESHOLD >= current);
        state
            .block_cache
            .retain(|_, block| block.height() + CLEAN_CACHE_THRESHOLD >= current);
    }

    // ── persist pipeline ────────────────────────────────────────────────

    /// Make one block durable in a single atomic batch. Nothing becomes
    /// visible if any step fails before the commit.
    fn persist(inner: &ChainInner, block: &Block) -> Result<(), LedgerError> {
        let kv = inner.kv.as_ref();
        let height = block.height();
        let block_hash = block.hash();

        let mut batch = WriteBatch::new();
        let mut state_store = StateStore::new(kv);
        let mut unspents: BTreeMap<Hash, Vec<u16>> = BTreeMap::new();
        let in_block: HashMap<Hash, &Transaction> = block
            .transactions
            .iter()
            .map(|tx| (tx.hash(), tx))
            .collect();

        Self::rotate_book_keepers(&mut state_store)?;

        for tx in &block.transactions {
            let txid = tx.hash();

            if tx.is_persisted_body() {
                let mut w = ByteWriter::new();
                w.write_u32_le(height);
                tx.encode(&mut w);
                batch.put(transaction_key(&txid), w.into_bytes());
            }

            if !tx.outputs.is_empty() {
                state_store.try_add(
                    DataEntryPrefix::StCoin,
                    txid.as_bytes(),
                    StateValue::Coin(UnspentCoinState::confirmed(tx.outputs.len())),
                    false,
                )?;
                unspents.insert(txid, (0..tx.outputs.len() as u16).collect());
            }

            Self::handle_outputs(&mut state_store, &txid, &tx.outputs)?;
            Self::handle_inputs(kv, &mut state_store, &mut unspents, &in_block, tx, height)?;
            Self::apply_payload(&mut state_store, tx, &txid, height)?;
        }

        // State overlay → batch + staged commitment tree.
        let mut trie = inner.trie.lock();
        let mut staged = trie.stage();
        state_store.commit_to(&mut batch, &mut staged)?;
        let state_root = staged.root();
        batch.put(state_root_key(), state_root.as_bytes().to_vec());

        // Unspent-set deltas. A fully spent set is deleted, not emptied.
        for (txid, indices) in &unspents {
            if indices.is_empty() {
                batch.delete(unspent_key(txid));
            } else {
                batch.put(unspent_key(txid), encode_unspent_indices(indices));
            }
        }

        batch.put(
            header_key(&block_hash),
            encode_header_record(BLOCK_SYSFEE_SENTINEL, &block.to_trimmed()),
        );
        batch.put(block_hash_key(height), block_hash.as_bytes().to_vec());
        let mut w = ByteWriter::new();
        block_hash.encode(&mut w);
        w.write_u32_le(height);
        batch.put(current_block_key(), w.into_bytes());

        let mut merkle = inner.merkle.lock();
        let mut appended = merkle.clone();
        appended.append(block.header.tx_root);
        batch.put(block_merkle_tree_key(), appended.to_blob());

        kv.commit_batch(batch)?;

        // In-memory commitments advance only after the durable commit.
        *merkle = appended;
        trie.apply(staged);
        Ok(())
    }

    fn rotate_book_keepers(state_store: &mut StateStore<'_>) -> Result<(), LedgerError> {
        let mut rotated = false;
        if let Some(value) =
            state_store.try_get_and_change(DataEntryPrefix::StBookKeeper, BOOKKEEPER_KEY, false)?
        {
            value.as_book_keeper_mut()?.rotate();
            rotated = true;
        }
        if !rotated {
            return Err(LedgerError::CorruptChain(
                "bookkeeper state missing; the store was never bootstrapped".into(),
            ));
        }
        Ok(())
    }

    /// Credit new outputs: account balances and per-address coin indexes.
    fn handle_outputs(
        state_store: &mut StateStore<'_>,
        txid: &Hash,
        outputs: &[TxOutput],
    ) -> Result<(), LedgerError> {
        for (index, output) in outputs.iter().enumerate() {
            let mut credited = false;
            if let Some(value) = state_store.try_get_and_change(
                DataEntryPrefix::StAccount,
                output.recipient.as_bytes(),
                true,
            )? {
                value
                    .as_account_mut()?
                    .credit(output.asset_id, output.value);
                credited = true;
            }
            if !credited {
                state_store.try_add(
                    DataEntryPrefix::StAccount,
                    output.recipient.as_bytes(),
                    StateValue::Account(AccountState::with_balance(
                        output.recipient,
                        output.asset_id,
                        output.value,
                    )),
                    true,
                )?;
            }

            let coin = ProgramCoin {
                txid: *txid,
                index: index as u16,
                value: output.value,
            };
            let suffix = program_coin_suffix(&output.recipient, &output.asset_id);
            let mut appended = false;
            if let Some(value) =
                state_store.try_get_and_change(DataEntryPrefix::StProgramCoin, &suffix, false)?
            {
                value.as_program_coin_mut()?.unspents.push(coin);
                appended = true;
            }
            if !appended {
                state_store.try_add(
                    DataEntryPrefix::StProgramCoin,
                    &suffix,
                    StateValue::ProgramCoin(ProgramUnspentCoin {
                        unspents: vec![coin],
                    }),
                    false,
                )?;
            }
        }
        Ok(())
    }

    /// Debit consumed inputs: coin states, spent-coin records, balances,
    /// per-address indexes, and the unspent-set deltas.
    fn handle_inputs(
        kv: &dyn KvStore,
        state_store: &mut StateStore<'_>,
        unspents: &mut BTreeMap<Hash, Vec<u16>>,
        in_block: &HashMap<Hash, &Transaction>,
        tx: &Transaction,
        height: u32,
    ) -> Result<(), LedgerError> {
        let fail = |reason: String| LedgerError::BlockVerify { height, reason };
        for input in &tx.inputs {
            let (ref_tx, ref_height) =
                Self::load_referenced_tx(kv, in_block, &input.prev_txid, height)?;
            let prev_output = ref_tx
                .outputs
                .get(input.prev_index as usize)
                .copied()
                .ok_or_else(|| {
                    fail(format!(
                        "input references missing output {} of {}",
                        input.prev_index, input.prev_txid
                    ))
                })?;

            // Coin state flips to Spent.
            let mut flipped = false;
            if let Some(value) = state_store.try_get_and_change(
                DataEntryPrefix::StCoin,
                input.prev_txid.as_bytes(),
                false,
            )? {
                let coin = value.as_coin_mut()?;
                match coin.items.get_mut(input.prev_index as usize) {
                    Some(item) => *item = crate::states::CoinState::Spent,
                    None => {
                        return Err(fail(format!(
                            "coin state for {} has no output {}",
                            input.prev_txid, input.prev_index
                        )))
                    }
                }
                flipped = true;
            }
            if !flipped {
                return Err(fail(format!(
                    "input references unknown coin state {}",
                    input.prev_txid
                )));
            }

            // Spent-coin (claimable) record.
            let item = SpentCoinItem {
                prev_index: input.prev_index,
                end_height: height,
            };
            let mut recorded = false;
            if let Some(value) = state_store.try_get_and_change(
                DataEntryPrefix::StSpentCoin,
                input.prev_txid.as_bytes(),
                false,
            )? {
                value.as_spent_coin_mut()?.items.push(item);
                recorded = true;
            }
            if !recorded {
                state_store.try_add(
                    DataEntryPrefix::StSpentCoin,
                    input.prev_txid.as_bytes(),
                    StateValue::SpentCoin(SpentCoinState {
                        txid: input.prev_txid,
                        tx_height: ref_height,
                        items: vec![item],
                    }),
                    false,
                )?;
            }

            // Sender balance.
            let mut debited = false;
            if let Some(value) = state_store.try_get_and_change(
                DataEntryPrefix::StAccount,
                prev_output.recipient.as_bytes(),
                true,
            )? {
                value
                    .as_account_mut()?
                    .debit(prev_output.asset_id, prev_output.value);
                debited = true;
            }
            if !debited {
                return Err(fail(format!(
                    "input spends from unknown account {}",
                    prev_output.recipient
                )));
            }

            // Per-address coin index.
            let suffix = program_coin_suffix(&prev_output.recipient, &prev_output.asset_id);
            if let Some(value) =
                state_store.try_get_and_change(DataEntryPrefix::StProgramCoin, &suffix, false)?
            {
                value
                    .as_program_coin_mut()?
                    .remove(&input.prev_txid, input.prev_index);
            }

            // Unspent-set delta.
            if !unspents.contains_key(&input.prev_txid) {
                let indices = match kv.get(&unspent_key(&input.prev_txid)) {
                    Ok(bytes) => decode_unspent_indices(&bytes)?,
                    Err(StoreError::NotFound) => {
                        return Err(LedgerError::NotUnspent {
                            txid: input.prev_txid,
                            index: input.prev_index,
                        })
                    }
                    Err(e) => return Err(e.into()),
                };
                unspents.insert(input.prev_txid, indices);
            }
            let indices = unspents
                .get_mut(&input.prev_txid)
                .expect("entry inserted above");
            let position = indices
                .iter()
                .position(|&i| i == input.prev_index)
                .ok_or(LedgerError::NotUnspent {
                    txid: input.prev_txid,
                    index: input.prev_index,
                })?;
            indices.remove(position);
        }
        Ok(())
    }

    fn load_referenced_tx(
        kv: &dyn KvStore,
        in_block: &HashMap<Hash, &Transaction>,
        txid: &Hash,
        height: u32,
    ) -> Result<(Transaction, u32), LedgerError> {
        if let Some(tx) = in_block.get(txid) {
            return Ok(((*tx).clone(), height));
        }
        let bytes = kv.get(&transaction_key(txid))?;
        let mut r = ByteReader::new(&bytes);
        let tx_height = r.read_u32_le()?;
        let tx = Transaction::decode(&mut r)?;
        r.expect_end()?;
        Ok((tx, tx_height))
    }

    /// State transitions specific to the transaction kind.
    fn apply_payload(
        state_store: &mut StateStore<'_>,
        tx: &Transaction,
        txid: &Hash,
        height: u32,
    ) -> Result<(), LedgerError> {
        let fail = |reason: String| LedgerError::BlockVerify { height, reason };
        match &tx.payload {
            TxPayload::RegisterAsset {
                name,
                amount,
                precision,
                issuer,
                admin,
            } => {
                state_store.try_get_or_add(
                    DataEntryPrefix::StAsset,
                    txid.as_bytes(),
                    StateValue::Asset(AssetState {
                        asset_id: *txid,
                        name: name.clone(),
                        precision: *precision,
                        amount: *amount,
                        available: *amount,
                        issuer: *issuer,
                        admin: *admin,
                        expiration: height + 2 * 2_000_000,
                        is_frozen: false,
                    }),
                    false,
                )?;
            }
            TxPayload::IssueAsset => {
                for (asset_id, issued) in tx.merged_issue_amounts() {
                    let mut applied = false;
                    if let Some(value) = state_store.try_get_and_change(
                        DataEntryPrefix::StAsset,
                        asset_id.as_bytes(),
                        false,
                    )? {
                        let asset = value.as_asset_mut()?;
                        asset.available -= issued;
                        applied = true;
                    }
                    if !applied {
                        return Err(fail(format!("issue of unregistered asset {asset_id}")));
                    }
                }
            }
            TxPayload::Claim { claims } => {
                for claim in claims {
                    let mut claimed = false;
                    if let Some(value) = state_store.try_get_and_change(
                        DataEntryPrefix::StSpentCoin,
                        claim.prev_txid.as_bytes(),
                        false,
                    )? {
                        let spent = value.as_spent_coin_mut()?;
                        spent.items.retain(|item| item.prev_index != claim.prev_index);
                        claimed = true;
                    }
                    if !claimed {
                        return Err(fail(format!(
                            "claim references unknown spent coins of {}",
                            claim.prev_txid
                        )));
                    }
                }
            }
            TxPayload::BookKeeper { member, action } => {
                let mut applied = false;
                if let Some(value) = state_store.try_get_and_change(
                    DataEntryPrefix::StBookKeeper,
                    BOOKKEEPER_KEY,
                    false,
                )? {
                    let book_keepers = value.as_book_keeper_mut()?;
                    match action {
                        chainloom_types::BookKeeperAction::Add => {
                            book_keepers.add_next(*member);
                        }
                        chainloom_types::BookKeeperAction::Remove => {
                            book_keepers.remove_next(member);
                        }
                    }
                    applied = true;
                }
                if !applied {
                    return Err(LedgerError::CorruptChain(
                        "bookkeeper state missing; the store was never bootstrapped".into(),
                    ));
                }
            }
            TxPayload::Enroll { public_key } => {
                state_store.try_add(
                    DataEntryPrefix::StValidator,
                    public_key,
                    StateValue::Validator(ValidatorState {
                        public_key: public_key.clone(),
                    }),
                    false,
                )?;
            }
            TxPayload::Vote {
                account,
                candidates,
            } => {
                state_store.try_add(
                    DataEntryPrefix::StVote,
                    account.as_bytes(),
                    StateValue::Vote(VoteState {
                        account: *account,
                        candidates: candidates.clone(),
                        count: Amount::ZERO,
                    }),
                    false,
                )?;
            }
            TxPayload::BookKeeping | TxPayload::Transfer | TxPayload::Record { .. } => {}
        }
        Ok(())
    }

    // ── reads ───────────────────────────────────────────────────────────

    fn read_header_record(&self, hash: &Hash) -> Result<(u64, TrimmedBlock), LedgerError> {
        let bytes = self.inner.kv.get(&header_key(hash))?;
        let mut r = ByteReader::new(&bytes);
        let sysfee = r.read_u64_le()?;
        let trimmed = TrimmedBlock::decode(&mut r)?;
        r.expect_end()?;
        Ok((sysfee, trimmed))
    }

    fn header_with_cache(&self, state: &ChainState, hash: &Hash) -> Result<Header, LedgerError> {
        if let Some(header) = state.header_cache.get(hash) {
            return Ok(header.clone());
        }
        Ok(self.read_header_record(hash)?.1.header)
    }

    /// Block hash at `height`.
    pub fn get_block_hash(&self, height: u32) -> Result<Hash, LedgerError> {
        let bytes = self.inner.kv.get(&block_hash_key(height))?;
        Ok(Hash::from_slice(&bytes)?)
    }

    /// Header by hash.
    pub fn get_header(&self, hash: &Hash) -> Result<Header, LedgerError> {
        {
            let state = self.inner.state.read();
            if let Some(header) = state.header_cache.get(hash) {
                return Ok(header.clone());
            }
        }
        Ok(self.read_header_record(hash)?.1.header)
    }

    /// Header hash at `height` from the in-memory index, covering headers
    /// whose blocks are not yet durable.
    pub fn get_header_hash_by_height(&self, height: u32) -> Option<Hash> {
        let state = self.inner.state.read();
        state.header_index.get(height as usize).copied()
    }

    /// Header at `height`.
    pub fn get_header_by_height(&self, height: u32) -> Result<Header, LedgerError> {
        match self.get_header_hash_by_height(height) {
            Some(hash) => self.get_header(&hash),
            None => Err(StoreError::NotFound.into()),
        }
    }

    /// Block by hash, with transaction bodies hydrated from the
    /// transaction table. Header-only records read as not found.
    pub fn get_block(&self, hash: &Hash) -> Result<Block, LedgerError> {
        {
            let state = self.inner.state.read();
            if let Some(block) = state.block_cache.get(hash) {
                return Ok(block.clone());
            }
        }
        let (sysfee, trimmed) = self.read_header_record(hash)?;
        if sysfee != BLOCK_SYSFEE_SENTINEL {
            return Err(StoreError::NotFound.into());
        }
        let mut transactions = Vec::with_capacity(trimmed.tx_hashes.len());
        for tx_hash in &trimmed.tx_hashes {
            transactions.push(self.get_transaction(tx_hash)?);
        }
        Ok(Block {
            header: trimmed.header,
            transactions,
        })
    }

    /// Block at `height`.
    pub fn get_block_by_height(&self, height: u32) -> Result<Block, LedgerError> {
        let hash = self.get_block_hash(height)?;
        self.get_block(&hash)
    }

    /// Transaction body by hash.
    pub fn get_transaction(&self, hash: &Hash) -> Result<Transaction, LedgerError> {
        Ok(self.get_transaction_with_height(hash)?.0)
    }

    /// Transaction body plus the height it was confirmed at.
    pub fn get_transaction_with_height(
        &self,
        hash: &Hash,
    ) -> Result<(Transaction, u32), LedgerError> {
        let bytes = self.inner.kv.get(&transaction_key(hash))?;
        let mut r = ByteReader::new(&bytes);
        let height = r.read_u32_le()?;
        let tx = Transaction::decode(&mut r)?;
        r.expect_end()?;
        Ok((tx, height))
    }

    /// Whether a transaction body is stored.
    pub fn is_tx_in_store(&self, hash: &Hash) -> Result<bool, LedgerError> {
        Ok(self.inner.kv.contains(&transaction_key(hash))?)
    }

    /// Whether a full block at or below the current height is stored.
    pub fn is_block_in_store(&self, hash: &Hash) -> Result<bool, LedgerError> {
        match self.read_header_record(hash) {
            Ok((sysfee, trimmed)) => Ok(sysfee == BLOCK_SYSFEE_SENTINEL
                && trimmed.header.height <= self.current_block_height()),
            Err(LedgerError::Store(StoreError::NotFound)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether a block is cached pending persistence.
    pub fn block_in_cache(&self, hash: &Hash) -> bool {
        self.inner.state.read().block_cache.contains_key(hash)
    }

    /// Hash of the latest durable block; zero before initialization.
    pub fn current_block_hash(&self) -> Hash {
        let state = self.inner.state.read();
        state
            .header_index
            .get(state.current_block_height as usize)
            .copied()
            .unwrap_or(Hash::ZERO)
    }

    /// Height of the latest durable block.
    pub fn current_block_height(&self) -> u32 {
        self.inner.state.read().current_block_height
    }

    /// Hash of the latest indexed header; zero before initialization.
    pub fn current_header_hash(&self) -> Hash {
        let state = self.inner.state.read();
        state.header_index.last().copied().unwrap_or(Hash::ZERO)
    }

    /// Height of the latest indexed header.
    pub fn current_header_height(&self) -> u32 {
        (self.inner.state.read().header_index.len() as u32).saturating_sub(1)
    }

    /// Latest committed state root; zero before any state committed.
    pub fn get_current_state_root(&self) -> Hash {
        match self.inner.kv.get(&state_root_key()) {
            Ok(bytes) => Hash::from_slice(&bytes).unwrap_or(Hash::ZERO),
            Err(_) => Hash::ZERO,
        }
    }

    /// Block merkle root if `tx_root` were appended next.
    pub fn get_block_root_with_new_tx_root(&self, tx_root: Hash) -> Hash {
        self.inner.merkle.lock().root_with_new_leaf(tx_root)
    }

    /// Legacy sysfee field of a header record; zero for block records
    /// (whose field is a placeholder) and missing records.
    pub fn get_sys_fee_amount(&self, hash: &Hash) -> Amount {
        match self.read_header_record(hash) {
            Ok((sysfee, _)) if sysfee != BLOCK_SYSFEE_SENTINEL => {
                Amount::from_raw(sysfee as i64)
            }
            _ => Amount::ZERO,
        }
    }

    // ── UTXO queries ────────────────────────────────────────────────────

    /// Whether output `index` of `txid` is still unspent. An absent
    /// unspent record means fully spent.
    pub fn contains_unspent(&self, txid: &Hash, index: u16) -> Result<bool, LedgerError> {
        match self.inner.kv.get(&unspent_key(txid)) {
            Ok(bytes) => Ok(decode_unspent_indices(&bytes)?.contains(&index)),
            Err(StoreError::NotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// The output behind an unspent reference.
    pub fn get_unspent(&self, txid: &Hash, index: u16) -> Result<TxOutput, LedgerError> {
        if !self.contains_unspent(txid, index)? {
            return Err(LedgerError::NotUnspent {
                txid: *txid,
                index,
            });
        }
        let tx = self.get_transaction(txid)?;
        tx.outputs
            .get(index as usize)
            .copied()
            .ok_or(LedgerError::NotUnspent {
                txid: *txid,
                index,
            })
    }

    /// Double-spend check. Fails open: any ambiguity — a missing or
    /// unreadable unspent record, a duplicate reference, an index not in
    /// the set — reads as a double spend.
    pub fn is_double_spend(&self, tx: &Transaction) -> bool {
        if tx.inputs.is_empty() {
            return false;
        }
        let mut groups: BTreeMap<Hash, Vec<u16>> = BTreeMap::new();
        for input in &tx.inputs {
            groups.entry(input.prev_txid).or_default().push(input.prev_index);
        }
        for (txid, mut indices) in groups {
            indices.sort_unstable();
            let duplicate = indices.windows(2).any(|pair| pair[0] == pair[1]);
            if duplicate {
                return true;
            }
            let unspent = match self.inner.kv.get(&unspent_key(&txid)) {
                Ok(bytes) => match decode_unspent_indices(&bytes) {
                    Ok(unspent) => unspent,
                    Err(e) => {
                        tracing::error!(%txid, error = %e, "unreadable unspent record");
                        return true;
                    }
                },
                Err(_) => return true,
            };
            if indices.iter().any(|index| !unspent.contains(index)) {
                return true;
            }
        }
        false
    }

    /// Unspent outputs held by `address` for `asset_id`.
    pub fn get_unspents_by_program(
        &self,
        address: &Address,
        asset_id: &Hash,
    ) -> Result<Vec<ProgramCoin>, LedgerError> {
        let suffix = program_coin_suffix(address, asset_id);
        let bytes = self
            .inner
            .kv
            .get(&DataEntryPrefix::StProgramCoin.key(&suffix))?;
        let value = StateValue::decode(DataEntryPrefix::StProgramCoin, &bytes)?;
        Ok(value.as_program_coin()?.unspents.clone())
    }

    /// Spent outputs of `txid` still claimable.
    pub fn get_unclaimed(&self, txid: &Hash) -> Result<Vec<ClaimableCoin>, LedgerError> {
        let (tx, _) = self.get_transaction_with_height(txid)?;
        let bytes = self.inner.kv.get(&spent_coin_key(txid))?;
        let value = StateValue::decode(DataEntryPrefix::StSpentCoin, &bytes)?;
        let spent = value.as_spent_coin()?;
        let mut claimable = Vec::with_capacity(spent.items.len());
        for item in &spent.items {
            let output = tx
                .outputs
                .get(item.prev_index as usize)
                .copied()
                .ok_or_else(|| {
                    LedgerError::CorruptChain(format!(
                        "spent coin record of {txid} references missing output {}",
                        item.prev_index
                    ))
                })?;
            claimable.push(ClaimableCoin {
                output,
                start_height: spent.tx_height,
                end_height: item.end_height,
            });
        }
        Ok(claimable)
    }

    // ── state queries ───────────────────────────────────────────────────

    fn get_state(&self, prefix: DataEntryPrefix, key: &[u8]) -> Result<StateValue, LedgerError> {
        let bytes = self.inner.kv.get(&prefix.key(key))?;
        StateValue::decode(prefix, &bytes)
    }

    /// Account state by address.
    pub fn get_account(&self, address: &Address) -> Result<AccountState, LedgerError> {
        Ok(self
            .get_state(DataEntryPrefix::StAccount, address.as_bytes())?
            .as_account()?
            .clone())
    }

    /// Asset registration by id.
    pub fn get_asset(&self, asset_id: &Hash) -> Result<AssetState, LedgerError> {
        Ok(self
            .get_state(DataEntryPrefix::StAsset, asset_id.as_bytes())?
            .as_asset()?
            .clone())
    }

    /// Amount of an asset issued so far. A missing asset record reads as
    /// zero — absence is a legitimate "nothing issued", not a failure.
    pub fn get_quantity_issued(&self, asset_id: &Hash) -> Result<Amount, LedgerError> {
        match self.get_state(DataEntryPrefix::StAsset, asset_id.as_bytes()) {
            Ok(value) => Ok(value.as_asset()?.issued()),
            Err(LedgerError::Store(StoreError::NotFound)) => Ok(Amount::ZERO),
            Err(e) => Err(e),
        }
    }

    /// Contract record by code hash.
    pub fn get_contract(&self, code_hash: &Hash) -> Result<ContractState, LedgerError> {
        let bytes = self
            .inner
            .kv
            .get(&DataEntryPrefix::StContract.key(code_hash.as_bytes()))?;
        let value = StateValue::decode(DataEntryPrefix::StContract, &bytes)?;
        match value {
            StateValue::Contract(contract) => Ok(contract),
            _ => Err(LedgerError::StateKindMismatch {
                expected: "contract",
            }),
        }
    }

    /// Contract storage entry by raw storage key.
    pub fn get_storage_item(&self, key: &[u8]) -> Result<StorageItem, LedgerError> {
        let value = self.get_state(DataEntryPrefix::StStorage, key)?;
        match value {
            StateValue::Storage(item) => Ok(item),
            _ => Err(LedgerError::StateKindMismatch { expected: "storage" }),
        }
    }

    /// The bookkeeper sets.
    pub fn get_book_keepers(&self) -> Result<BookKeeperState, LedgerError> {
        Ok(self
            .get_state(DataEntryPrefix::StBookKeeper, BOOKKEEPER_KEY)?
            .as_book_keeper()?
            .clone())
    }

    /// Every registered asset.
    pub fn get_assets(&self) -> Result<BTreeMap<Hash, AssetState>, LedgerError> {
        let mut assets = BTreeMap::new();
        for (key, bytes) in self
            .inner
            .kv
            .iter_prefix(&[DataEntryPrefix::StAsset.byte()])
        {
            let asset_id = Hash::from_slice(&key[1..])?;
            let value = StateValue::decode(DataEntryPrefix::StAsset, &bytes)?;
            assets.insert(asset_id, value.as_asset()?.clone());
        }
        Ok(assets)
    }

    /// Every recorded vote.
    pub fn get_vote_states(&self) -> Result<Vec<VoteState>, LedgerError> {
        let mut votes = Vec::new();
        for (_, bytes) in self.inner.kv.iter_prefix(&[DataEntryPrefix::StVote.byte()]) {
            let value = StateValue::decode(DataEntryPrefix::StVote, &bytes)?;
            match value {
                StateValue::Vote(vote) => votes.push(vote),
                _ => return Err(LedgerError::StateKindMismatch { expected: "vote" }),
            }
        }
        Ok(votes)
    }

    /// Every enrolled validator candidate.
    pub fn get_enrollments(&self) -> Result<Vec<ValidatorState>, LedgerError> {
        let mut validators = Vec::new();
        for (_, bytes) in self
            .inner
            .kv
            .iter_prefix(&[DataEntryPrefix::StValidator.byte()])
        {
            let value = StateValue::decode(DataEntryPrefix::StValidator, &bytes)?;
            match value {
                StateValue::Validator(validator) => validators.push(validator),
                _ => {
                    return Err(LedgerError::StateKindMismatch {
                        expected: "validator",
                    })
                }
            }
        }
        Ok(validators)
    }
}

impl Drop for ChainStore {
    fn drop(&mut self) {
        self.close();
    }
}

fn encode_header_record(sysfee: u64, trimmed: &TrimmedBlock) -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_u64_le(sysfee);
    trimmed.encode(&mut w);
    w.into_bytes()
}

fn encode_unspent_indices(indices: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(indices.len() * 2);
    for index in indices {
        bytes.extend_from_slice(&index.to_le_bytes());
    }
    bytes
}

fn decode_unspent_indices(bytes: &[u8]) -> Result<Vec<u16>, LedgerError> {
    if bytes.len() % 2 != 0 {
        return Err(LedgerError::CorruptChain(
            "unspent record length is not a multiple of two".into(),
        ));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unspent_indices_roundtrip() {
        let indices = vec![0u16, 3, 7, 65535];
        let bytes = encode_unspent_indices(&indices);
        assert_eq!(bytes.len(), 8);
        assert_eq!(decode_unspent_indices(&bytes).unwrap(), indices);
        assert!(decode_unspent_indices(&[1]).is_err());
    }

    #[test]
    fn test_header_record_layout() {
        let header = Header {
            version: 0,
            prev_block_hash: Hash::ZERO,
            tx_root: Hash::ZERO,
            state_root: Hash::ZERO,
            timestamp: 1,
            height: 0,
            consensus_nonce: 0,
            next_bookkeeper: Address::ZERO,
            signature: vec![],
        };
        let record = encode_header_record(
            0,
            &TrimmedBlock {
                header: header.clone(),
                tx_hashes: vec![],
            },
        );
        let mut r = ByteReader::new(&record);
        assert_eq!(r.read_u64_le().unwrap(), 0);
        let trimmed = TrimmedBlock::decode(&mut r).unwrap();
        assert_eq!(trimmed.header, header);
        r.expect_end().unwrap();
    }
}
