//! Offline ledger tooling.
//!
//! Block export files carry a whole chain in the deterministic codec:
//! a magic tag, a format version, the end height, then each block as a
//! length-prefixed record. [`replay`] rebuilds a ledger from such a file
//! in memory, which is what the `ledger-dump` inspector runs its queries
//! against.

use chainloom_actor::EventStream;
use chainloom_ledger::{ChainStore, LedgerError};
use chainloom_storage::MemoryKv;
use chainloom_types::{
    Block, ByteReader, ByteWriter, CodecError, Decodable, Encodable, Hash,
};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Leading magic of a block export file.
pub const EXPORT_MAGIC: &[u8; 4] = b"CLBK";

/// Current export format version.
pub const EXPORT_VERSION: u8 = 1;

const REPLAY_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from export parsing and replay.
#[derive(Debug, Error)]
pub enum ToolError {
    /// File I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The export file is not in the expected format.
    #[error("malformed export file: {0}")]
    Malformed(String),

    /// A block record failed to decode.
    #[error("corrupt block record")]
    Codec(#[from] CodecError),

    /// Replaying the exported chain failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A lookup subcommand found nothing.
    #[error("{what} {id} not found")]
    NotFound {
        /// What kind of record was looked up.
        what: &'static str,
        /// The identifier that missed.
        id: Hash,
    },
}

/// Write `blocks` (ascending heights, genesis first) as an export file.
pub fn write_export(blocks: &[Block], out: &mut dyn Write) -> Result<(), ToolError> {
    let end_height = blocks.last().map(Block::height).unwrap_or(0);
    let mut w = ByteWriter::new();
    w.write_bytes(EXPORT_MAGIC);
    w.write_u8(EXPORT_VERSION);
    w.write_u32_le(end_height);
    w.write_var_uint(blocks.len() as u64);
    for block in blocks {
        w.write_var_bytes(&block.to_vec());
    }
    out.write_all(&w.into_bytes())?;
    Ok(())
}

/// Read every block from an export file.
pub fn read_export(input: &mut dyn Read) -> Result<Vec<Block>, ToolError> {
    let mut bytes = Vec::new();
    input.read_to_end(&mut bytes)?;
    let mut r = ByteReader::new(&bytes);

    let magic = r.read_exact(EXPORT_MAGIC.len())?;
    if magic != EXPORT_MAGIC.as_slice() {
        return Err(ToolError::Malformed("bad magic".into()));
    }
    let version = r.read_u8()?;
    if version != EXPORT_VERSION {
        return Err(ToolError::Malformed(format!(
            "unsupported export version {version}"
        )));
    }
    let end_height = r.read_u32_le()?;
    let count = r.read_var_uint()?;

    let mut blocks = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let record = r.read_var_bytes()?;
        blocks.push(Block::from_bytes(&record)?);
    }
    r.expect_end()?;

    if blocks.last().map(Block::height).unwrap_or(0) != end_height {
        return Err(ToolError::Malformed(
            "metadata end height disagrees with the block records".into(),
        ));
    }
    Ok(blocks)
}

/// Rebuild a ledger from exported blocks in memory.
pub fn replay(blocks: &[Block]) -> Result<ChainStore, ToolError> {
    let Some(genesis) = blocks.first() else {
        return Err(ToolError::Malformed("export carries no blocks".into()));
    };
    if genesis.height() != 0 {
        return Err(ToolError::Malformed(format!(
            "export starts at height {}, expected genesis",
            genesis.height()
        )));
    }

    let store = ChainStore::new(Arc::new(MemoryKv::new()), EventStream::new());
    store.init_with_genesis(genesis, &[genesis.header.next_bookkeeper])?;
    for block in &blocks[1..] {
        store.save_block(block.clone())?.wait(REPLAY_TIMEOUT)?;
    }
    Ok(store)
}

/// Write every block's height/hash/timestamp/tx-root/tx list as flat text.
pub fn dump_chain(store: &ChainStore, out: &mut dyn Write) -> Result<(), ToolError> {
    for height in 0..=store.current_block_height() {
        let block = store.get_block_by_height(height)?;
        writeln!(
            out,
            "block {height} hash={} time={} txroot={}",
            block.hash(),
            block.header.timestamp,
            block.header.tx_root
        )?;
        for tx in &block.transactions {
            writeln!(out, "  tx {} type={}", tx.hash(), tx.payload.type_name())?;
        }
    }
    Ok(())
}

/// Print one block.
pub fn dump_block(store: &ChainStore, hash: Hash, out: &mut dyn Write) -> Result<(), ToolError> {
    let block = store.get_block(&hash).map_err(|e| match e {
        LedgerError::Store(chainloom_storage::StoreError::NotFound) => ToolError::NotFound {
            what: "block",
            id: hash,
        },
        other => other.into(),
    })?;
    writeln!(
        out,
        "block {} hash={} prev={} time={} txroot={} stateroot={}",
        block.height(),
        block.hash(),
        block.header.prev_block_hash,
        block.header.timestamp,
        block.header.tx_root,
        block.header.state_root
    )?;
    for tx in &block.transactions {
        writeln!(out, "  tx {} type={}", tx.hash(), tx.payload.type_name())?;
    }
    Ok(())
}

/// Print one transaction with its inputs and outputs.
pub fn dump_tx(store: &ChainStore, txid: Hash, out: &mut dyn Write) -> Result<(), ToolError> {
    let (tx, height) = store.get_transaction_with_height(&txid).map_err(|e| match e {
        LedgerError::Store(chainloom_storage::StoreError::NotFound) => ToolError::NotFound {
            what: "transaction",
            id: txid,
        },
        other => other.into(),
    })?;
    writeln!(
        out,
        "tx {} type={} height={height} nonce={}",
        txid,
        tx.payload.type_name(),
        tx.nonce
    )?;
    for input in &tx.inputs {
        writeln!(out, "  in  {}:{}", input.prev_txid, input.prev_index)?;
    }
    for (index, output) in tx.outputs.iter().enumerate() {
        writeln!(
            out,
            "  out {index} asset={} value={} to={}",
            output.asset_id, output.value, output.recipient
        )?;
    }
    Ok(())
}

/// Print one asset registration and its issuance.
pub fn dump_asset(store: &ChainStore, asset_id: Hash, out: &mut dyn Write) -> Result<(), ToolError> {
    let asset = store.get_asset(&asset_id).map_err(|e| match e {
        LedgerError::Store(chainloom_storage::StoreError::NotFound) => ToolError::NotFound {
            what: "asset",
            id: asset_id,
        },
        other => other.into(),
    })?;
    writeln!(
        out,
        "asset {} name={} precision={} amount={} available={} issued={} issuer={}",
        asset.asset_id,
        asset.name,
        asset.precision,
        asset.amount,
        asset.available,
        asset.issued(),
        asset.issuer
    )?;
    Ok(())
}
