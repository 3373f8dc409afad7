//! Core ledger types.
//!
//! This crate provides the content-addressed primitives shared by the
//! storage and ledger layers:
//!
//! - [`Hash`]: 32-byte Blake3 content hash
//! - [`Address`] / [`Amount`]: account identifiers and fixed-point values
//! - [`Transaction`] with its tagged [`TxPayload`]
//! - [`Header`] / [`Block`] / [`TrimmedBlock`]
//! - [`codec`]: the deterministic byte codec every persisted record uses
//!
//! Everything here is a plain value: no I/O, no locks, no globals.

#![warn(missing_docs)]

mod address;
mod amount;
mod block;
pub mod codec;
mod hash;
mod transaction;

pub use address::Address;
pub use amount::Amount;
pub use block::{Block, Header, TrimmedBlock};
pub use codec::{ByteReader, ByteWriter, CodecError, Decodable, Encodable};
pub use hash::{compute_merkle_root, Hash};
pub use transaction::{BookKeeperAction, Transaction, TxInput, TxOutput, TxPayload};
