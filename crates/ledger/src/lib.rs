//! Ledger persistence core.
//!
//! An append-mostly ledger store over an ordered key-value store, accessed
//! through an actor so every mutation is serialized through message
//! passing:
//!
//! - [`ChainStore`]: header index, pending-block cache, and the atomic
//!   persist pipeline (transactions, unspent sets, state transitions,
//!   commitment roots)
//! - [`StateStore`]: read-through, write-back overlay for one block's
//!   state transitions
//! - [`StateHashTree`] / [`CompactMerkleTree`]: state and block
//!   commitments
//! - [`LedgerActor`] + [`LedgerClient`]: the typed request/reply facade
//!   and its blocking client
//!
//! Consensus, gossip, and contract execution live elsewhere; this crate
//! only answers how blocks, transactions, and state are durably stored
//! and how other components talk to that store.

#![warn(missing_docs)]

mod actor;
mod chain_store;
mod client;
mod error;
mod events;
mod merkle;
mod messages;
mod state_store;
pub mod states;
mod trie;

pub use actor::LedgerActor;
pub use chain_store::{
    ChainStore, ClaimableCoin, HeaderVerifier, PersistHandle, StructuralVerifier,
    HEADER_HASH_LIST_COUNT,
};
pub use client::LedgerClient;
pub use error::LedgerError;
pub use events::BlockPersisted;
pub use merkle::CompactMerkleTree;
pub use messages::{LedgerReply, LedgerRequest};
pub use state_store::{ItemState, StateItem, StateStore};
pub use trie::{StagedStateTree, StateHashTree};
