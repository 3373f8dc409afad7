//! Block headers and blocks.

use crate::address::Address;
use crate::codec::{ByteReader, ByteWriter, CodecError, Decodable, Encodable};
use crate::hash::{compute_merkle_root, Hash};
use crate::transaction::Transaction;

/// A block header.
///
/// Content-addressed by the hash of its unsigned serialization, so the
/// signature can be attached or stripped without changing the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Format version.
    pub version: u32,
    /// Hash of the previous block's header; `Hash::ZERO` for genesis.
    pub prev_block_hash: Hash,
    /// Merkle root over the block's transaction hashes.
    pub tx_root: Hash,
    /// State commitment root after applying this block.
    pub state_root: Hash,
    /// Unix timestamp in seconds. Must strictly increase along the chain.
    pub timestamp: u32,
    /// Height of this block; genesis is 0.
    pub height: u32,
    /// Consensus nonce chosen by the producer.
    pub consensus_nonce: u64,
    /// Bookkeeper set expected to produce the next block.
    pub next_bookkeeper: Address,
    /// Producer signature over the unsigned header (opaque to the ledger).
    pub signature: Vec<u8>,
}

impl Header {
    /// Content hash over the unsigned serialization.
    pub fn hash(&self) -> Hash {
        let mut w = ByteWriter::new();
        self.encode_unsigned(&mut w);
        Hash::digest(&w.into_bytes())
    }

    fn encode_unsigned(&self, w: &mut ByteWriter) {
        w.write_u32_le(self.version);
        self.prev_block_hash.encode(w);
        self.tx_root.encode(w);
        self.state_root.encode(w);
        w.write_u32_le(self.timestamp);
        w.write_u32_le(self.height);
        w.write_u64_le(self.consensus_nonce);
        self.next_bookkeeper.encode(w);
    }
}

impl Encodable for Header {
    fn encode(&self, w: &mut ByteWriter) {
        self.encode_unsigned(w);
        w.write_var_bytes(&self.signature);
    }
}

impl Decodable for Header {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            version: r.read_u32_le()?,
            prev_block_hash: Hash::decode(r)?,
            tx_root: Hash::decode(r)?,
            state_root: Hash::decode(r)?,
            timestamp: r.read_u32_le()?,
            height: r.read_u32_le()?,
            consensus_nonce: r.read_u64_le()?,
            next_bookkeeper: Address::decode(r)?,
            signature: r.read_var_bytes()?,
        })
    }
}

/// A block: header plus full transaction bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// The block header.
    pub header: Header,
    /// Transactions in block order.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Block identity: the header hash.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Height shorthand.
    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// Merkle root over this block's transaction hashes.
    pub fn compute_tx_root(&self) -> Hash {
        let hashes: Vec<Hash> = self.transactions.iter().map(Transaction::hash).collect();
        compute_merkle_root(&hashes)
    }

    /// Trimmed form: header plus transaction hashes only.
    ///
    /// This is what block records store; bodies live in the transaction
    /// table and are hydrated on read.
    pub fn to_trimmed(&self) -> TrimmedBlock {
        TrimmedBlock {
            header: self.header.clone(),
            tx_hashes: self.transactions.iter().map(Transaction::hash).collect(),
        }
    }
}

impl Encodable for Block {
    fn encode(&self, w: &mut ByteWriter) {
        self.header.encode(w);
        w.write_var_uint(self.transactions.len() as u64);
        for tx in &self.transactions {
            tx.encode(w);
        }
    }
}

impl Decodable for Block {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let header = Header::decode(r)?;
        let count = r.read_var_uint()?;
        let mut transactions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            transactions.push(Transaction::decode(r)?);
        }
        Ok(Self {
            header,
            transactions,
        })
    }
}

/// A block with transaction bodies replaced by their hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimmedBlock {
    /// The block header.
    pub header: Header,
    /// Hashes of the block's transactions, in block order.
    pub tx_hashes: Vec<Hash>,
}

impl Encodable for TrimmedBlock {
    fn encode(&self, w: &mut ByteWriter) {
        self.header.encode(w);
        w.write_var_uint(self.tx_hashes.len() as u64);
        for hash in &self.tx_hashes {
            hash.encode(w);
        }
    }
}

impl Decodable for TrimmedBlock {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let header = Header::decode(r)?;
        let count = r.read_var_uint()?;
        let mut tx_hashes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            tx_hashes.push(Hash::decode(r)?);
        }
        Ok(Self { header, tx_hashes })
    }
}
