//! Deterministic fixture builders for tests.
//!
//! Everything here is content-derived: the same calls always produce the
//! same hashes, so tests can assert byte-identical round trips. No clocks,
//! no randomness.

use chainloom_types::{
    Address, Amount, Block, Hash, Header, Transaction, TxInput, TxOutput, TxPayload,
};

/// Base timestamp of fixture chains; block N is stamped `BASE + N`.
pub const BASE_TIMESTAMP: u32 = 1_700_000_000;

/// Deterministic account address `n`.
pub fn address(n: u8) -> Address {
    Address::from_program(&[b'a', b'c', b'c', b't', n])
}

/// The bookkeeper address fixture chains use.
pub fn bookkeeper() -> Address {
    address(0)
}

/// A bookkeeping (producer) transaction with a distinguishing nonce.
pub fn bookkeeping_tx(nonce: u64) -> Transaction {
    Transaction {
        payload: TxPayload::BookKeeping,
        nonce,
        inputs: vec![],
        outputs: vec![],
    }
}

/// An asset registration; the asset id is the returned transaction's hash.
pub fn register_tx(name: &str, total: i64) -> Transaction {
    Transaction {
        payload: TxPayload::RegisterAsset {
            name: name.to_string(),
            amount: Amount::from_whole(total),
            precision: 8,
            issuer: address(1),
            admin: address(1),
        },
        nonce: 0,
        inputs: vec![],
        outputs: vec![],
    }
}

/// Issue `outputs` of a registered asset.
pub fn issue_tx(nonce: u64, outputs: Vec<TxOutput>) -> Transaction {
    Transaction {
        payload: TxPayload::IssueAsset,
        nonce,
        inputs: vec![],
        outputs,
    }
}

/// Plain transfer.
pub fn transfer_tx(nonce: u64, inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Transaction {
    Transaction {
        payload: TxPayload::Transfer,
        nonce,
        inputs,
        outputs,
    }
}

/// One output.
pub fn output(asset_id: Hash, whole: i64, recipient: Address) -> TxOutput {
    TxOutput {
        asset_id,
        value: Amount::from_whole(whole),
        recipient,
    }
}

/// One input spending `(txid, index)`.
pub fn input(txid: Hash, index: u16) -> TxInput {
    TxInput {
        prev_txid: txid,
        prev_index: index,
    }
}

fn header_for(height: u32, prev_block_hash: Hash, transactions: &[Transaction]) -> Header {
    let hashes: Vec<Hash> = transactions.iter().map(Transaction::hash).collect();
    Header {
        version: 0,
        prev_block_hash,
        tx_root: chainloom_types::compute_merkle_root(&hashes),
        state_root: Hash::ZERO,
        timestamp: BASE_TIMESTAMP + height,
        height,
        consensus_nonce: u64::from(height),
        next_bookkeeper: bookkeeper(),
        signature: vec![0xAB; 64],
    }
}

/// A genesis block registering asset "core" and issuing it to accounts
/// 1 and 2.
///
/// The issue transaction's outputs are `[50 → address(1), 30 → address(2)]`,
/// so tests can spend `(issue_txid, 0)` and `(issue_txid, 1)`.
pub fn genesis_block() -> Block {
    let register = register_tx("core", 1_000_000);
    let asset_id = register.hash();
    let issue = issue_tx(
        1,
        vec![
            output(asset_id, 50, address(1)),
            output(asset_id, 30, address(2)),
        ],
    );
    let transactions = vec![bookkeeping_tx(0), register, issue];
    Block {
        header: header_for(0, Hash::ZERO, &transactions),
        transactions,
    }
}

/// The asset id registered by [`genesis_block`].
pub fn genesis_asset_id() -> Hash {
    register_tx("core", 1_000_000).hash()
}

/// The issue transaction in [`genesis_block`], whose outputs tests spend.
pub fn genesis_issue_tx() -> Transaction {
    issue_tx(
        1,
        vec![
            output(genesis_asset_id(), 50, address(1)),
            output(genesis_asset_id(), 30, address(2)),
        ],
    )
}

/// The block following `parent`, carrying `transactions` plus a leading
/// bookkeeping transaction.
pub fn next_block(parent: &Block, mut transactions: Vec<Transaction>) -> Block {
    let height = parent.height() + 1;
    transactions.insert(0, bookkeeping_tx(u64::from(height)));
    Block {
        header: header_for(height, parent.hash(), &transactions),
        transactions,
    }
}

/// A chain of `length` blocks starting at genesis, each carrying only its
/// bookkeeping transaction.
pub fn chain(length: u32) -> Vec<Block> {
    let mut blocks = vec![genesis_block()];
    for _ in 1..length {
        let next = next_block(blocks.last().expect("chain starts with genesis"), vec![]);
        blocks.push(next);
    }
    blocks
}
