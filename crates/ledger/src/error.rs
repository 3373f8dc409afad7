//! Ledger error taxonomy.

use chainloom_actor::ActorError;
use chainloom_storage::StoreError;
use chainloom_types::{CodecError, Hash};
use thiserror::Error;

/// Errors from the chain store, state store, and ledger actor facade.
///
/// Ordering violations (headers or blocks arriving out of height order)
/// are explicit variants — never silently buffered or reordered. Actor
/// communication failures wrap their cause instead of replacing it with a
/// generic failure.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Key-value layer failure (including distinct not-found).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A record existed but its bytes did not decode.
    #[error("corrupt record")]
    Codec(#[from] CodecError),

    /// A header arrived beyond the next expected height.
    #[error("header at height {height} out of order, expected {expected}")]
    HeaderOutOfOrder {
        /// Height of the offending header.
        height: u32,
        /// The next height the index would accept.
        expected: u32,
    },

    /// A header failed linkage, ordering, timestamp, or structural checks.
    #[error("header {height} failed verification: {reason}")]
    HeaderVerify {
        /// Height of the offending header.
        height: u32,
        /// What check failed.
        reason: String,
    },

    /// A block arrived before its header was indexed.
    #[error("block height {height} is ahead of the header index ({header_height})")]
    BlockAheadOfHeaders {
        /// Height of the offending block.
        height: u32,
        /// Current header index length.
        header_height: u32,
    },

    /// A block failed verification.
    #[error("block {height} failed verification: {reason}")]
    BlockVerify {
        /// Height of the offending block.
        height: u32,
        /// What check failed.
        reason: String,
    },

    /// A state key was used with conflicting trie flags in one batch.
    #[error("conflicting trie flags for state key under prefix {prefix:#04x}")]
    TrieFlagConflict {
        /// Prefix byte of the offending key.
        prefix: u8,
    },

    /// A state record decoded to a different kind than the caller expected.
    #[error("state value is not a {expected}")]
    StateKindMismatch {
        /// The kind the caller asked for.
        expected: &'static str,
    },

    /// The referenced output is not unspent.
    #[error("output {index} of transaction {txid} is not unspent")]
    NotUnspent {
        /// Referenced transaction.
        txid: Hash,
        /// Referenced output index.
        index: u16,
    },

    /// Persisted chain metadata is inconsistent; fatal at boot.
    #[error("corrupt chain state: {0}")]
    CorruptChain(String),

    /// A background persist failed after the block was accepted.
    #[error("block persistence failed: {0}")]
    PersistFailed(String),

    /// Waiting on a persist completion handle timed out.
    #[error("timed out waiting for block persistence")]
    PersistTimeout,

    /// The chain store writer has shut down.
    #[error("chain store is closed")]
    Closed,

    /// Request/reply to the ledger actor failed; the cause is preserved.
    #[error("ledger actor communication failed")]
    ActorComm(#[source] ActorError),
}
