//! Chain store and ledger actor integration tests.

use chainloom_actor::{ActorSystem, EventStream, SyncDispatcher};
use chainloom_ledger::{
    BlockPersisted, ChainStore, LedgerActor, LedgerClient, LedgerError,
};
use chainloom_storage::{keys, DataEntryPrefix, KvStore, MemoryKv, StoreError};
use chainloom_storage::keys::{block_hash_key, transaction_key, unspent_key};
use chainloom_testkit as fixtures;
use chainloom_types::{Amount, Encodable, Hash, Header};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(5);

fn open_store(kv: &Arc<MemoryKv>) -> ChainStore {
    ChainStore::new(kv.clone(), EventStream::new())
}

fn init_genesis(store: &ChainStore) -> chainloom_types::Block {
    let genesis = fixtures::genesis_block();
    let height = store
        .init_with_genesis(&genesis, &[fixtures::bookkeeper()])
        .unwrap();
    assert_eq!(height, 0);
    genesis
}

fn wait_for_height(store: &ChainStore, height: u32) {
    let deadline = Instant::now() + WAIT;
    while store.current_block_height() < height {
        assert!(
            Instant::now() < deadline,
            "store never reached height {height}"
        );
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_genesis_end_to_end() {
    let kv = Arc::new(MemoryKv::new());
    let store = open_store(&kv);
    let genesis = init_genesis(&store);
    let genesis_hash = genesis.hash();

    assert_eq!(store.get_block_hash(0).unwrap(), genesis_hash);
    assert_eq!(store.current_block_height(), 0);
    assert_eq!(store.current_block_hash(), genesis_hash);

    let stored = store.get_block(&genesis_hash).unwrap();
    assert_eq!(stored.height(), 0);
    assert_eq!(stored.transactions, genesis.transactions);
    for (stored_tx, original) in stored.transactions.iter().zip(&genesis.transactions) {
        assert_eq!(stored_tx.to_vec(), original.to_vec());
    }

    // One header on top of genesis advances the header height.
    let block1 = fixtures::next_block(&genesis, vec![]);
    store.add_headers(vec![block1.header.clone()]).unwrap();
    assert_eq!(store.current_header_height(), 1);
    assert_eq!(store.current_header_hash(), block1.hash());
    assert_eq!(store.get_header(&block1.hash()).unwrap(), block1.header);
}

#[test]
fn test_reinit_preserves_initialized_chain() {
    let kv = Arc::new(MemoryKv::new());
    {
        let store = open_store(&kv);
        init_genesis(&store);
    }
    // A second store over the same database must not wipe it.
    let store = open_store(&kv);
    let genesis = init_genesis(&store);
    assert_eq!(store.get_block_hash(0).unwrap(), genesis.hash());

    // A different genesis is a fatal mismatch.
    let store = open_store(&kv);
    let mut other = fixtures::genesis_block();
    other.header.consensus_nonce = 999;
    let err = store
        .init_with_genesis(&other, &[fixtures::bookkeeper()])
        .unwrap_err();
    assert!(matches!(err, LedgerError::CorruptChain(_)));
}

#[test]
fn test_unspent_round_trip() {
    let kv = Arc::new(MemoryKv::new());
    let store = open_store(&kv);
    let genesis = init_genesis(&store);
    let issue_txid = fixtures::genesis_issue_tx().hash();
    let asset = fixtures::genesis_asset_id();

    // Both issued outputs start unspent.
    assert!(store.contains_unspent(&issue_txid, 0).unwrap());
    assert!(store.contains_unspent(&issue_txid, 1).unwrap());
    assert!(!store.contains_unspent(&issue_txid, 2).unwrap());

    // Spend output 0 in the next block.
    let spend = fixtures::transfer_tx(
        7,
        vec![fixtures::input(issue_txid, 0)],
        vec![fixtures::output(asset, 50, fixtures::address(3))],
    );
    let spend_txid = spend.hash();
    let block1 = fixtures::next_block(&genesis, vec![spend]);
    store.save_block(block1).unwrap().wait(WAIT).unwrap();

    assert!(!store.contains_unspent(&issue_txid, 0).unwrap());
    assert!(store.contains_unspent(&issue_txid, 1).unwrap());
    assert!(store.contains_unspent(&spend_txid, 0).unwrap());

    // Balances moved with the spend.
    let sender = store.get_account(&fixtures::address(1)).unwrap();
    assert_eq!(sender.balance(&asset), Amount::ZERO);
    let receiver = store.get_account(&fixtures::address(3)).unwrap();
    assert_eq!(receiver.balance(&asset), Amount::from_whole(50));

    // The spent output is claimable.
    let claimable = store.get_unclaimed(&issue_txid).unwrap();
    assert_eq!(claimable.len(), 1);
    assert_eq!(claimable[0].end_height, 1);
    assert_eq!(claimable[0].output.recipient, fixtures::address(1));

    // Double-spend detection fails open.
    let double = fixtures::transfer_tx(
        8,
        vec![fixtures::input(issue_txid, 0)],
        vec![fixtures::output(asset, 50, fixtures::address(4))],
    );
    assert!(store.is_double_spend(&double));
    let fresh = fixtures::transfer_tx(
        9,
        vec![fixtures::input(issue_txid, 1)],
        vec![fixtures::output(asset, 30, fixtures::address(4))],
    );
    assert!(!store.is_double_spend(&fresh));
    let unknown = fixtures::transfer_tx(
        10,
        vec![fixtures::input(Hash::digest(b"missing"), 0)],
        vec![],
    );
    assert!(store.is_double_spend(&unknown));
}

#[test]
fn test_persist_atomicity_on_mid_batch_failure() {
    let kv = Arc::new(MemoryKv::new());
    let store = open_store(&kv);
    let genesis = init_genesis(&store);
    let issue_txid = fixtures::genesis_issue_tx().hash();
    let asset = fixtures::genesis_asset_id();

    let spend = fixtures::transfer_tx(
        7,
        vec![fixtures::input(issue_txid, 0)],
        vec![fixtures::output(asset, 50, fixtures::address(3))],
    );
    let spend_txid = spend.hash();
    let block1 = fixtures::next_block(&genesis, vec![spend]);
    let block1_hash = block1.hash();

    // Index the header first so save_block takes the cache-drain path and
    // the injected fault hits the persist batch itself.
    store.add_headers(vec![block1.header.clone()]).unwrap();
    kv.inject_batch_fault(0);

    let handle = store.save_block(block1.clone()).unwrap();
    let err = handle.wait(WAIT).unwrap_err();
    assert!(matches!(err, LedgerError::PersistFailed(_)));

    // Nothing from the failed batch is observable.
    assert_eq!(store.current_block_height(), 0);
    assert!(matches!(
        kv.get(&block_hash_key(1)),
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        kv.get(&transaction_key(&spend_txid)),
        Err(StoreError::NotFound)
    ));
    assert!(store.contains_unspent(&issue_txid, 0).unwrap());
    assert!(matches!(
        store.get_block(&block1_hash).unwrap_err(),
        LedgerError::Store(StoreError::NotFound)
    ));
    assert_eq!(store.current_block_hash(), genesis.hash());

    // The fault is one-shot; resubmitting the block succeeds.
    store.save_block(block1).unwrap().wait(WAIT).unwrap();
    assert_eq!(store.current_block_height(), 1);
    assert!(!store.contains_unspent(&issue_txid, 0).unwrap());
}

#[test]
fn test_header_index_monotonicity() {
    let kv = Arc::new(MemoryKv::new());
    let store = open_store(&kv);
    init_genesis(&store);
    let blocks = fixtures::chain(6);
    let headers: Vec<Header> = blocks[1..].iter().map(|b| b.header.clone()).collect();

    // In-order append.
    store.add_headers(headers[..3].to_vec()).unwrap();
    assert_eq!(store.current_header_height(), 3);

    // Duplicates are skipped, not errors.
    store.add_headers(headers[..2].to_vec()).unwrap();
    assert_eq!(store.current_header_height(), 3);

    // A gap stops processing with an ordering error.
    let err = store.add_headers(vec![headers[4].clone()]).unwrap_err();
    assert!(matches!(err, LedgerError::HeaderOutOfOrder { .. }));
    assert_eq!(store.current_header_height(), 3);

    // A verification failure stops the whole remainder of the batch.
    let mut bad = headers[3].clone();
    bad.timestamp = blocks[2].header.timestamp; // not strictly increasing
    let err = store
        .add_headers(vec![bad, headers[4].clone()])
        .unwrap_err();
    assert!(matches!(err, LedgerError::HeaderVerify { .. }));
    assert_eq!(store.current_header_height(), 3);

    // The untouched tail can still be appended afterwards.
    store.add_headers(headers[3..].to_vec()).unwrap();
    assert_eq!(store.current_header_height(), 5);
}

#[test]
fn test_save_block_ordering_rules() {
    let kv = Arc::new(MemoryKv::new());
    let store = open_store(&kv);
    init_genesis(&store);
    let blocks = fixtures::chain(4);

    // A block beyond the header index fails loudly.
    let err = store.save_block(blocks[3].clone()).unwrap_err();
    assert!(matches!(err, LedgerError::BlockAheadOfHeaders { .. }));

    // With headers 1 and 2 indexed, block 2 is accepted but cannot drain
    // past the missing block 1.
    store
        .add_headers(vec![blocks[1].header.clone(), blocks[2].header.clone()])
        .unwrap();
    let handle2 = store.save_block(blocks[2].clone()).unwrap();
    assert!(matches!(
        handle2.wait(Duration::from_millis(100)),
        Err(LedgerError::PersistTimeout)
    ));
    assert!(store.block_in_cache(&blocks[2].hash()));
    assert_eq!(store.current_block_height(), 0);

    // Block 1 arrives; both drain strictly in order.
    let handle1 = store.save_block(blocks[1].clone()).unwrap();
    handle1.wait(WAIT).unwrap();
    handle2.wait(WAIT).unwrap();
    assert_eq!(store.current_block_height(), 2);
    assert!(!store.block_in_cache(&blocks[2].hash()));

    // A block whose hash does not match its indexed header is rejected.
    store.add_headers(vec![blocks[3].header.clone()]).unwrap();
    let mut forged = blocks[3].clone();
    forged.header.consensus_nonce = 12345;
    let err = store.save_block(forged).unwrap_err();
    assert!(matches!(err, LedgerError::BlockVerify { .. }));

    // A tampered transaction list breaks the root check on the next block.
    let mut bad = fixtures::next_block(&blocks[3], vec![]);
    bad.transactions.push(fixtures::bookkeeping_tx(999));
    let err = store.save_block(bad).unwrap_err();
    assert!(matches!(err, LedgerError::BlockVerify { .. }));
}

#[test]
fn test_block_persisted_events_in_order() {
    let kv = Arc::new(MemoryKv::new());
    let events = EventStream::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    events.subscribe::<BlockPersisted>(move |event| {
        seen_clone.lock().push((event.height, event.hash));
    });

    let store = ChainStore::new(kv.clone(), events);
    init_genesis(&store);
    let blocks = fixtures::chain(4);
    for block in &blocks[1..] {
        store.add_headers(vec![block.header.clone()]).unwrap();
    }
    let mut last = None;
    for block in &blocks[1..] {
        last = Some(store.save_block(block.clone()).unwrap());
    }
    last.unwrap().wait(WAIT).unwrap();

    let observed = seen.lock().clone();
    let expected: Vec<(u32, Hash)> = blocks[1..]
        .iter()
        .map(|b| (b.height(), b.hash()))
        .collect();
    assert_eq!(observed, expected);
}

#[test]
fn test_restart_recovers_via_scan_and_header_walk() {
    let kv = Arc::new(MemoryKv::new());
    let blocks = fixtures::chain(5);
    {
        let store = open_store(&kv);
        init_genesis(&store);
        for block in &blocks[1..4] {
            store.save_block(block.clone()).unwrap().wait(WAIT).unwrap();
        }
        // Header 4 is indexed but its block never arrives.
        store.add_headers(vec![blocks[4].header.clone()]).unwrap();
    }

    let store = open_store(&kv);
    let header_height = store
        .init_with_genesis(&fixtures::genesis_block(), &[fixtures::bookkeeper()])
        .unwrap();
    assert_eq!(header_height, 4);
    assert_eq!(store.current_block_height(), 3);
    assert_eq!(store.current_header_hash(), blocks[4].hash());
    assert_eq!(store.get_block(&blocks[2].hash()).unwrap(), blocks[2]);

    // The recovered store keeps extending the chain.
    store
        .save_block(blocks[4].clone())
        .unwrap()
        .wait(WAIT)
        .unwrap();
    assert_eq!(store.current_block_height(), 4);
}

#[test]
fn test_header_chunk_checkpoint_and_fast_recovery() {
    let kv = Arc::new(MemoryKv::new());
    let chunk = chainloom_ledger::HEADER_HASH_LIST_COUNT;
    let length = chunk + 50;
    let blocks = fixtures::chain(length);
    {
        let store = open_store(&kv);
        init_genesis(&store);
        let mut last = None;
        for block in &blocks[1..] {
            store.add_headers(vec![block.header.clone()]).unwrap();
            last = Some(store.save_block(block.clone()).unwrap());
        }
        last.unwrap().wait(Duration::from_secs(60)).unwrap();
    }

    // One full chunk was checkpointed.
    assert!(kv.get(&keys::header_hash_list_key(0)).is_ok());
    assert!(matches!(
        kv.get(&keys::header_hash_list_key(chunk)),
        Err(StoreError::NotFound)
    ));

    let store = open_store(&kv);
    let header_height = store
        .init_with_genesis(&fixtures::genesis_block(), &[fixtures::bookkeeper()])
        .unwrap();
    assert_eq!(header_height, length - 1);
    assert_eq!(store.current_block_height(), length - 1);
    assert_eq!(
        store.get_block_hash(chunk - 1).unwrap(),
        blocks[(chunk - 1) as usize].hash()
    );
}

#[test]
fn test_quantity_issued_defaults_to_zero() {
    let kv = Arc::new(MemoryKv::new());
    let store = open_store(&kv);
    init_genesis(&store);

    assert_eq!(
        store.get_quantity_issued(&Hash::digest(b"nonexistent")).unwrap(),
        Amount::ZERO
    );
    // Genesis issued 80 of the core asset.
    assert_eq!(
        store.get_quantity_issued(&fixtures::genesis_asset_id()).unwrap(),
        Amount::from_whole(80)
    );
}

#[test]
fn test_ledger_actor_facade() {
    let kv = Arc::new(MemoryKv::new());
    let store = Arc::new(open_store(&kv));
    let genesis = init_genesis(&store);

    let system = ActorSystem::with_dispatcher(SyncDispatcher::shared());
    let pid = system.spawn(LedgerActor::props(store.clone()));
    let client = LedgerClient::new(system.clone(), pid.clone());

    // Property 9 through the message-passing facade.
    assert_eq!(client.get_block_hash(0).unwrap(), genesis.hash());
    let fetched = client.get_block(genesis.hash()).unwrap();
    assert_eq!(fetched.height(), 0);
    assert_eq!(fetched.transactions, genesis.transactions);

    let block1 = fixtures::next_block(&genesis, vec![]);
    client.add_headers(vec![block1.header.clone()]).unwrap();
    assert_eq!(client.get_current_header_height().unwrap(), 1);
    // Header is queryable by height before its block is durable.
    assert_eq!(
        client.get_header_by_height(1).unwrap(),
        block1.header
    );

    let saved = client.save_block(block1.clone()).unwrap();
    assert_eq!(saved, block1.hash());
    wait_for_height(&store, 1);
    assert_eq!(client.get_current_block_height().unwrap(), 1);
    assert_eq!(client.get_current_block_hash().unwrap(), block1.hash());
    assert!(client.contains_block(block1.hash()).unwrap());

    // Queries cover transactions, state, and commitments.
    let issue = fixtures::genesis_issue_tx();
    assert_eq!(client.get_transaction(issue.hash()).unwrap(), issue);
    let (tx, height) = client.get_transaction_with_height(issue.hash()).unwrap();
    assert_eq!((tx.hash(), height), (issue.hash(), 0));
    assert!(client.contains_transaction(issue.hash()).unwrap());
    assert!(client.contains_unspent(issue.hash(), 1).unwrap());

    let asset = client.get_asset(fixtures::genesis_asset_id()).unwrap();
    assert_eq!(asset.name, "core");
    assert_eq!(
        client.get_quantity_issued(fixtures::genesis_asset_id()).unwrap(),
        Amount::from_whole(80)
    );
    let account = client.get_account(fixtures::address(1)).unwrap();
    assert_eq!(
        account.balance(&fixtures::genesis_asset_id()),
        Amount::from_whole(50)
    );
    let book_keepers = client.get_book_keepers().unwrap();
    assert_eq!(book_keepers.current, vec![fixtures::bookkeeper()]);
    assert_ne!(client.get_current_state_root().unwrap(), Hash::ZERO);

    // Domain errors travel back through the reply channel.
    let err = client.get_transaction(Hash::digest(b"missing")).unwrap_err();
    assert!(matches!(err, LedgerError::Store(StoreError::NotFound)));

    // Unsupported message types are dropped without a reply; the caller's
    // own timeout fires and the actor keeps serving.
    struct Bogus;
    let result = system
        .request_future(&pid, Bogus, Duration::from_millis(50))
        .result();
    assert!(result.is_err());
    assert_eq!(client.get_current_block_height().unwrap(), 1);
}

#[test]
fn test_state_root_survives_restart() {
    let kv = Arc::new(MemoryKv::new());
    let root = {
        let store = open_store(&kv);
        init_genesis(&store);
        store.get_current_state_root()
    };
    assert_ne!(root, Hash::ZERO);

    let store = open_store(&kv);
    store
        .init_with_genesis(&fixtures::genesis_block(), &[fixtures::bookkeeper()])
        .unwrap();
    assert_eq!(store.get_current_state_root(), root);

    // And the recovered in-memory tree computes the same root for the
    // next commitment.
    let genesis = fixtures::genesis_block();
    let block1 = fixtures::next_block(&genesis, vec![]);
    store.save_block(block1).unwrap().wait(WAIT).unwrap();
    assert_eq!(store.current_block_height(), 1);
}

#[test]
fn test_bookkeeper_rotation_through_blocks() {
    let kv = Arc::new(MemoryKv::new());
    let store = open_store(&kv);
    let genesis = init_genesis(&store);

    let joiner = fixtures::address(9);
    let join_tx = chainloom_types::Transaction {
        payload: chainloom_types::TxPayload::BookKeeper {
            member: joiner,
            action: chainloom_types::BookKeeperAction::Add,
        },
        nonce: 70,
        inputs: vec![],
        outputs: vec![],
    };
    let block1 = fixtures::next_block(&genesis, vec![join_tx]);
    store.save_block(block1.clone()).unwrap().wait(WAIT).unwrap();

    let after_join = store.get_book_keepers().unwrap();
    assert!(after_join.next.contains(&joiner));
    assert!(!after_join.current.contains(&joiner));

    // The following block rotates next into current.
    let block2 = fixtures::next_block(&block1, vec![]);
    store.save_block(block2).unwrap().wait(WAIT).unwrap();
    let after_rotation = store.get_book_keepers().unwrap();
    assert!(after_rotation.current.contains(&joiner));
}

#[test]
fn test_prefix_partition_of_persisted_keys() {
    let kv = Arc::new(MemoryKv::new());
    let store = open_store(&kv);
    init_genesis(&store);

    // Every key the bootstrap wrote decodes to exactly one known prefix.
    for (key, _) in kv.iter_prefix(&[]) {
        let prefix = DataEntryPrefix::from_byte(key[0]);
        assert!(
            prefix.is_some(),
            "key {:02x?} carries an unknown prefix byte",
            &key[..key.len().min(8)]
        );
    }

    // And records live where their table says: the issue tx's unspent set
    // under IX_Unspent, its body under DATA_Transaction.
    let issue_txid = fixtures::genesis_issue_tx().hash();
    assert!(kv.get(&unspent_key(&issue_txid)).is_ok());
    assert!(kv.get(&transaction_key(&issue_txid)).is_ok());
    assert_eq!(unspent_key(&issue_txid)[0], 0x21);
    assert_eq!(transaction_key(&issue_txid)[0], 0x02);
}
