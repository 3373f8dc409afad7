//! Ledger transactions.
//!
//! A transaction is a tagged payload plus UTXO inputs and outputs. Only some
//! payload kinds have their bodies persisted in the transaction table; the
//! rest are referenced from block records but reconstructed from state.

use crate::address::Address;
use crate::amount::Amount;
use crate::codec::{ByteReader, ByteWriter, CodecError, Decodable, Encodable};
use crate::hash::Hash;
use std::collections::BTreeMap;

/// Reference to a previous transaction output being spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxInput {
    /// Hash of the transaction whose output is spent.
    pub prev_txid: Hash,
    /// Index of the spent output within that transaction.
    pub prev_index: u16,
}

impl Encodable for TxInput {
    fn encode(&self, w: &mut ByteWriter) {
        self.prev_txid.encode(w);
        w.write_u16_le(self.prev_index);
    }
}

impl Decodable for TxInput {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            prev_txid: Hash::decode(r)?,
            prev_index: r.read_u16_le()?,
        })
    }
}

/// A newly created asset output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutput {
    /// Asset being transferred.
    pub asset_id: Hash,
    /// Amount of the asset.
    pub value: Amount,
    /// Receiving account.
    pub recipient: Address,
}

impl Encodable for TxOutput {
    fn encode(&self, w: &mut ByteWriter) {
        self.asset_id.encode(w);
        self.value.encode(w);
        self.recipient.encode(w);
    }
}

impl Decodable for TxOutput {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            asset_id: Hash::decode(r)?,
            value: Amount::decode(r)?,
            recipient: Address::decode(r)?,
        })
    }
}

/// Bookkeeper membership change carried by a [`TxPayload::BookKeeper`] tx.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookKeeperAction {
    /// Add the address to the next bookkeeper set.
    Add,
    /// Remove the address from the next bookkeeper set.
    Remove,
}

/// Transaction payload variants.
///
/// The discriminant byte is part of the persisted encoding; values are
/// spaced so new kinds slot into their group without renumbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxPayload {
    /// Block-producer bookkeeping transaction (one per block).
    BookKeeping,
    /// Issue previously registered asset units to the outputs.
    IssueAsset,
    /// Change the bookkeeper set.
    BookKeeper {
        /// Bookkeeper account being added or removed.
        member: Address,
        /// Whether the member joins or leaves the next set.
        action: BookKeeperAction,
    },
    /// Claim spent outputs (system-fee redemption).
    Claim {
        /// Spent outputs being claimed.
        claims: Vec<TxInput>,
    },
    /// Enroll a validator candidate.
    Enroll {
        /// Candidate public key bytes (opaque to the ledger).
        public_key: Vec<u8>,
    },
    /// Vote for validator candidates.
    Vote {
        /// Voting account.
        account: Address,
        /// Candidate public keys voted for.
        candidates: Vec<Vec<u8>>,
    },
    /// Register a new asset.
    RegisterAsset {
        /// Human-readable asset name.
        name: String,
        /// Total registered amount.
        amount: Amount,
        /// Decimal precision of the asset.
        precision: u8,
        /// Issuing account.
        issuer: Address,
        /// Administrative account.
        admin: Address,
    },
    /// Plain asset transfer (inputs to outputs).
    Transfer,
    /// Arbitrary application record anchored on chain.
    Record {
        /// Application-defined record type.
        record_type: String,
        /// Opaque record payload.
        data: Vec<u8>,
    },
}

impl TxPayload {
    /// Persisted discriminant byte for this payload kind.
    pub fn type_byte(&self) -> u8 {
        match self {
            TxPayload::BookKeeping => 0x00,
            TxPayload::IssueAsset => 0x01,
            TxPayload::BookKeeper { .. } => 0x02,
            TxPayload::Claim { .. } => 0x03,
            TxPayload::Enroll { .. } => 0x20,
            TxPayload::Vote { .. } => 0x24,
            TxPayload::RegisterAsset { .. } => 0x40,
            TxPayload::Transfer => 0x80,
            TxPayload::Record { .. } => 0x81,
        }
    }

    /// Short name for logs and the dump tool.
    pub fn type_name(&self) -> &'static str {
        match self {
            TxPayload::BookKeeping => "bookkeeping",
            TxPayload::IssueAsset => "issue",
            TxPayload::BookKeeper { .. } => "bookkeeper",
            TxPayload::Claim { .. } => "claim",
            TxPayload::Enroll { .. } => "enroll",
            TxPayload::Vote { .. } => "vote",
            TxPayload::RegisterAsset { .. } => "register",
            TxPayload::Transfer => "transfer",
            TxPayload::Record { .. } => "record",
        }
    }
}

/// A ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Payload determining the transaction's effect on state.
    pub payload: TxPayload,
    /// Uniqueness nonce (distinguishes otherwise identical transactions).
    pub nonce: u64,
    /// Spent outputs.
    pub inputs: Vec<TxInput>,
    /// Created outputs.
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Content hash of the serialized transaction.
    pub fn hash(&self) -> Hash {
        Hash::digest(&self.to_vec())
    }

    /// Whether this transaction's body is stored in the transaction table.
    ///
    /// Register/issue/transfer, record, and bookkeeping kinds are persisted;
    /// claim, enroll, and vote transactions only leave their state effects.
    pub fn is_persisted_body(&self) -> bool {
        matches!(
            self.payload,
            TxPayload::BookKeeping
                | TxPayload::IssueAsset
                | TxPayload::BookKeeper { .. }
                | TxPayload::RegisterAsset { .. }
                | TxPayload::Transfer
                | TxPayload::Record { .. }
        )
    }

    /// Sum issued output value per asset, for issuance accounting.
    pub fn merged_issue_amounts(&self) -> BTreeMap<Hash, Amount> {
        let mut merged = BTreeMap::new();
        for output in &self.outputs {
            *merged.entry(output.asset_id).or_insert(Amount::ZERO) += output.value;
        }
        merged
    }
}

impl Encodable for Transaction {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_u8(self.payload.type_byte());
        w.write_u64_le(self.nonce);
        match &self.payload {
            TxPayload::BookKeeping | TxPayload::IssueAsset | TxPayload::Transfer => {}
            TxPayload::BookKeeper { member, action } => {
                member.encode(w);
                w.write_u8(match action {
                    BookKeeperAction::Add => 0,
                    BookKeeperAction::Remove => 1,
                });
            }
            TxPayload::Claim { claims } => {
                w.write_var_uint(claims.len() as u64);
                for claim in claims {
                    claim.encode(w);
                }
            }
            TxPayload::Enroll { public_key } => {
                w.write_var_bytes(public_key);
            }
            TxPayload::Vote {
                account,
                candidates,
            } => {
                account.encode(w);
                w.write_var_uint(candidates.len() as u64);
                for candidate in candidates {
                    w.write_var_bytes(candidate);
                }
            }
            TxPayload::RegisterAsset {
                name,
                amount,
                precision,
                issuer,
                admin,
            } => {
                w.write_var_string(name);
                amount.encode(w);
                w.write_u8(*precision);
                issuer.encode(w);
                admin.encode(w);
            }
            TxPayload::Record { record_type, data } => {
                w.write_var_string(record_type);
                w.write_var_bytes(data);
            }
        }
        w.write_var_uint(self.inputs.len() as u64);
        for input in &self.inputs {
            input.encode(w);
        }
        w.write_var_uint(self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode(w);
        }
    }
}

impl Decodable for Transaction {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let type_byte = r.read_u8()?;
        let nonce = r.read_u64_le()?;
        let payload = match type_byte {
            0x00 => TxPayload::BookKeeping,
            0x01 => TxPayload::IssueAsset,
            0x02 => {
                let member = Address::decode(r)?;
                let action = match r.read_u8()? {
                    0 => BookKeeperAction::Add,
                    1 => BookKeeperAction::Remove,
                    other => {
                        return Err(CodecError::Invalid {
                            what: "bookkeeper action",
                            detail: format!("unknown action byte 0x{other:02x}"),
                        })
                    }
                };
                TxPayload::BookKeeper { member, action }
            }
            0x03 => {
                let count = r.read_var_uint()?;
                let mut claims = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    claims.push(TxInput::decode(r)?);
                }
                TxPayload::Claim { claims }
            }
            0x20 => TxPayload::Enroll {
                public_key: r.read_var_bytes()?,
            },
            0x24 => {
                let account = Address::decode(r)?;
                let count = r.read_var_uint()?;
                let mut candidates = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    candidates.push(r.read_var_bytes()?);
                }
                TxPayload::Vote {
                    account,
                    candidates,
                }
            }
            0x40 => TxPayload::RegisterAsset {
                name: r.read_var_string()?,
                amount: Amount::decode(r)?,
                precision: r.read_u8()?,
                issuer: Address::decode(r)?,
                admin: Address::decode(r)?,
            },
            0x80 => TxPayload::Transfer,
            0x81 => TxPayload::Record {
                record_type: r.read_var_string()?,
                data: r.read_var_bytes()?,
            },
            other => {
                return Err(CodecError::Invalid {
                    what: "transaction type",
                    detail: format!("unknown type byte 0x{other:02x}"),
                })
            }
        };

        let input_count = r.read_var_uint()?;
        let mut inputs = Vec::with_capacity(input_count as usize);
        for _ in 0..input_count {
            inputs.push(TxInput::decode(r)?);
        }
        let output_count = r.read_var_uint()?;
        let mut outputs = Vec::with_capacity(output_count as usize);
        for _ in 0..output_count {
            outputs.push(TxOutput::decode(r)?);
        }

        Ok(Self {
            payload,
            nonce,
            inputs,
            outputs,
        })
    }
}
