//! State objects tracked through the overlay cache.
//!
//! Each state kind lives under its own key prefix; [`StateValue::decode`]
//! dispatches on that prefix, so a key's first byte fully determines how
//! its value decodes. The dispatch is a closed tagged union — an unknown
//! prefix is an error, never a panic.

use crate::LedgerError;
use chainloom_storage::DataEntryPrefix;
use chainloom_types::{
    Address, Amount, ByteReader, ByteWriter, CodecError, Decodable, Encodable, Hash,
};
use std::collections::BTreeMap;

/// Spend status of one transaction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinState {
    /// Output exists and has not been consumed.
    Confirmed,
    /// Output has been consumed by a later input.
    Spent,
}

impl Encodable for CoinState {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_u8(match self {
            CoinState::Confirmed => 0,
            CoinState::Spent => 1,
        });
    }
}

impl Decodable for CoinState {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        match r.read_u8()? {
            0 => Ok(CoinState::Confirmed),
            1 => Ok(CoinState::Spent),
            other => Err(CodecError::Invalid {
                what: "coin state",
                detail: format!("unknown tag {other:#04x}"),
            }),
        }
    }
}

/// Per-account balances.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountState {
    /// The account address.
    pub address: Address,
    /// Frozen accounts cannot spend.
    pub is_frozen: bool,
    /// Balance per asset id. Sorted map for deterministic serialization.
    pub balances: BTreeMap<Hash, Amount>,
}

impl AccountState {
    /// Account with a single starting balance.
    pub fn with_balance(address: Address, asset_id: Hash, value: Amount) -> Self {
        let mut balances = BTreeMap::new();
        balances.insert(asset_id, value);
        Self {
            address,
            is_frozen: false,
            balances,
        }
    }

    /// Balance for an asset, zero when absent.
    pub fn balance(&self, asset_id: &Hash) -> Amount {
        self.balances.get(asset_id).copied().unwrap_or(Amount::ZERO)
    }

    /// Add to an asset balance.
    pub fn credit(&mut self, asset_id: Hash, value: Amount) {
        *self.balances.entry(asset_id).or_insert(Amount::ZERO) += value;
    }

    /// Subtract from an asset balance.
    pub fn debit(&mut self, asset_id: Hash, value: Amount) {
        *self.balances.entry(asset_id).or_insert(Amount::ZERO) -= value;
    }
}

impl Encodable for AccountState {
    fn encode(&self, w: &mut ByteWriter) {
        self.address.encode(w);
        w.write_u8(self.is_frozen as u8);
        w.write_var_uint(self.balances.len() as u64);
        for (asset_id, value) in &self.balances {
            asset_id.encode(w);
            value.encode(w);
        }
    }
}

impl Decodable for AccountState {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let address = Address::decode(r)?;
        let is_frozen = r.read_u8()? != 0;
        let count = r.read_var_uint()?;
        let mut balances = BTreeMap::new();
        for _ in 0..count {
            let asset_id = Hash::decode(r)?;
            let value = Amount::decode(r)?;
            balances.insert(asset_id, value);
        }
        Ok(Self {
            address,
            is_frozen,
            balances,
        })
    }
}

/// Spend status of every output of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnspentCoinState {
    /// One entry per output, indexed by output position.
    pub items: Vec<CoinState>,
}

impl UnspentCoinState {
    /// All outputs confirmed (a freshly persisted transaction).
    pub fn confirmed(count: usize) -> Self {
        Self {
            items: vec![CoinState::Confirmed; count],
        }
    }

    /// Whether the output at `index` exists and is unspent.
    pub fn is_unspent(&self, index: u16) -> bool {
        self.items
            .get(index as usize)
            .is_some_and(|state| *state == CoinState::Confirmed)
    }
}

impl Encodable for UnspentCoinState {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_var_uint(self.items.len() as u64);
        for item in &self.items {
            item.encode(w);
        }
    }
}

impl Decodable for UnspentCoinState {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let count = r.read_var_uint()?;
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(CoinState::decode(r)?);
        }
        Ok(Self { items })
    }
}

/// One spent output awaiting claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpentCoinItem {
    /// Index of the spent output in its transaction.
    pub prev_index: u16,
    /// Height of the block that consumed it.
    pub end_height: u32,
}

/// Spent (claimable) outputs of one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpentCoinState {
    /// The transaction whose outputs were spent.
    pub txid: Hash,
    /// Height the transaction was confirmed at.
    pub tx_height: u32,
    /// Spent outputs not yet claimed.
    pub items: Vec<SpentCoinItem>,
}

impl Encodable for SpentCoinState {
    fn encode(&self, w: &mut ByteWriter) {
        self.txid.encode(w);
        w.write_u32_le(self.tx_height);
        w.write_var_uint(self.items.len() as u64);
        for item in &self.items {
            w.write_u16_le(item.prev_index);
            w.write_u32_le(item.end_height);
        }
    }
}

impl Decodable for SpentCoinState {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let txid = Hash::decode(r)?;
        let tx_height = r.read_u32_le()?;
        let count = r.read_var_uint()?;
        let mut items = Vec::with_capacity(count as usize);
        for _ in 0..count {
            items.push(SpentCoinItem {
                prev_index: r.read_u16_le()?,
                end_height: r.read_u32_le()?,
            });
        }
        Ok(Self {
            txid,
            tx_height,
            items,
        })
    }
}

/// The bookkeeper (block producer) sets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookKeeperState {
    /// Bookkeepers for the current epoch.
    pub current: Vec<Address>,
    /// Bookkeepers taking over once rotation applies.
    pub next: Vec<Address>,
}

impl BookKeeperState {
    /// Start with identical current and next sets.
    pub fn new(members: Vec<Address>) -> Self {
        Self {
            current: members.clone(),
            next: members,
        }
    }

    /// Apply next → current when they differ. Returns whether anything
    /// changed.
    pub fn rotate(&mut self) -> bool {
        if self.current != self.next {
            self.current = self.next.clone();
            true
        } else {
            false
        }
    }

    /// Add a member to the next set, keeping it sorted and unique.
    pub fn add_next(&mut self, member: Address) -> bool {
        if self.next.contains(&member) {
            return false;
        }
        self.next.push(member);
        self.next.sort();
        true
    }

    /// Remove a member from the next set.
    pub fn remove_next(&mut self, member: &Address) -> bool {
        let before = self.next.len();
        self.next.retain(|m| m != member);
        self.next.len() != before
    }
}

fn encode_addresses(addresses: &[Address], w: &mut ByteWriter) {
    w.write_var_uint(addresses.len() as u64);
    for address in addresses {
        address.encode(w);
    }
}

fn decode_addresses(r: &mut ByteReader<'_>) -> Result<Vec<Address>, CodecError> {
    let count = r.read_var_uint()?;
    let mut addresses = Vec::with_capacity(count as usize);
    for _ in 0..count {
        addresses.push(Address::decode(r)?);
    }
    Ok(addresses)
}

impl Encodable for BookKeeperState {
    fn encode(&self, w: &mut ByteWriter) {
        encode_addresses(&self.current, w);
        encode_addresses(&self.next, w);
    }
}

impl Decodable for BookKeeperState {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            current: decode_addresses(r)?,
            next: decode_addresses(r)?,
        })
    }
}

/// A registered asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetState {
    /// Asset id: the hash of its registration transaction.
    pub asset_id: Hash,
    /// Human-readable name.
    pub name: String,
    /// Decimal precision.
    pub precision: u8,
    /// Total registered amount.
    pub amount: Amount,
    /// Amount not yet issued.
    pub available: Amount,
    /// Issuing account.
    pub issuer: Address,
    /// Administrative account.
    pub admin: Address,
    /// Height at which the registration lapses.
    pub expiration: u32,
    /// Frozen assets cannot move.
    pub is_frozen: bool,
}

impl AssetState {
    /// Amount issued so far.
    pub fn issued(&self) -> Amount {
        self.amount - self.available
    }
}

impl Encodable for AssetState {
    fn encode(&self, w: &mut ByteWriter) {
        self.asset_id.encode(w);
        w.write_var_string(&self.name);
        w.write_u8(self.precision);
        self.amount.encode(w);
        self.available.encode(w);
        self.issuer.encode(w);
        self.admin.encode(w);
        w.write_u32_le(self.expiration);
        w.write_u8(self.is_frozen as u8);
    }
}

impl Decodable for AssetState {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            asset_id: Hash::decode(r)?,
            name: r.read_var_string()?,
            precision: r.read_u8()?,
            amount: Amount::decode(r)?,
            available: Amount::decode(r)?,
            issuer: Address::decode(r)?,
            admin: Address::decode(r)?,
            expiration: r.read_u32_le()?,
            is_frozen: r.read_u8()? != 0,
        })
    }
}

/// A deployed contract's code and metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractState {
    /// Content hash of the code.
    pub code_hash: Hash,
    /// The code itself (opaque to the ledger).
    pub code: Vec<u8>,
    /// Contract name.
    pub name: String,
    /// Contract version string.
    pub version: String,
    /// Author metadata.
    pub author: String,
    /// Contact metadata.
    pub email: String,
    /// Description metadata.
    pub description: String,
}

impl Encodable for ContractState {
    fn encode(&self, w: &mut ByteWriter) {
        self.code_hash.encode(w);
        w.write_var_bytes(&self.code);
        w.write_var_string(&self.name);
        w.write_var_string(&self.version);
        w.write_var_string(&self.author);
        w.write_var_string(&self.email);
        w.write_var_string(&self.description);
    }
}

impl Decodable for ContractState {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            code_hash: Hash::decode(r)?,
            code: r.read_var_bytes()?,
            name: r.read_var_string()?,
            version: r.read_var_string()?,
            author: r.read_var_string()?,
            email: r.read_var_string()?,
            description: r.read_var_string()?,
        })
    }
}

/// One contract storage entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageItem {
    /// Stored bytes.
    pub value: Vec<u8>,
}

impl Encodable for StorageItem {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_var_bytes(&self.value);
    }
}

impl Decodable for StorageItem {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            value: r.read_var_bytes()?,
        })
    }
}

/// One unspent output held by an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramCoin {
    /// The transaction that created the output.
    pub txid: Hash,
    /// Output index within that transaction.
    pub index: u16,
    /// Output value.
    pub value: Amount,
}

/// Unspent outputs of one (address, asset) pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramUnspentCoin {
    /// The unspent outputs.
    pub unspents: Vec<ProgramCoin>,
}

impl ProgramUnspentCoin {
    /// Remove the entry for a specific output, if present.
    pub fn remove(&mut self, txid: &Hash, index: u16) -> bool {
        let before = self.unspents.len();
        self.unspents
            .retain(|coin| !(coin.txid == *txid && coin.index == index));
        self.unspents.len() != before
    }
}

impl Encodable for ProgramUnspentCoin {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_var_uint(self.unspents.len() as u64);
        for coin in &self.unspents {
            coin.txid.encode(w);
            w.write_u16_le(coin.index);
            coin.value.encode(w);
        }
    }
}

impl Decodable for ProgramUnspentCoin {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let count = r.read_var_uint()?;
        let mut unspents = Vec::with_capacity(count as usize);
        for _ in 0..count {
            unspents.push(ProgramCoin {
                txid: Hash::decode(r)?,
                index: r.read_u16_le()?,
                value: Amount::decode(r)?,
            });
        }
        Ok(Self { unspents })
    }
}

/// An enrolled validator candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorState {
    /// Candidate public key bytes (opaque to the ledger).
    pub public_key: Vec<u8>,
}

impl Encodable for ValidatorState {
    fn encode(&self, w: &mut ByteWriter) {
        w.write_var_bytes(&self.public_key);
    }
}

impl Decodable for ValidatorState {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            public_key: r.read_var_bytes()?,
        })
    }
}

/// One account's validator vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteState {
    /// Voting account.
    pub account: Address,
    /// Candidate public keys voted for.
    pub candidates: Vec<Vec<u8>>,
    /// Vote weight (the account's holdings at tally time).
    pub count: Amount,
}

impl Encodable for VoteState {
    fn encode(&self, w: &mut ByteWriter) {
        self.account.encode(w);
        w.write_var_uint(self.candidates.len() as u64);
        for candidate in &self.candidates {
            w.write_var_bytes(candidate);
        }
        self.count.encode(w);
    }
}

impl Decodable for VoteState {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, CodecError> {
        let account = Address::decode(r)?;
        let count = r.read_var_uint()?;
        let mut candidates = Vec::with_capacity(count as usize);
        for _ in 0..count {
            candidates.push(r.read_var_bytes()?);
        }
        Ok(Self {
            account,
            candidates,
            count: Amount::decode(r)?,
        })
    }
}

/// Tagged union over every state kind, dispatched by key prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateValue {
    /// `ST_Account`
    Account(AccountState),
    /// `ST_Coin`
    Coin(UnspentCoinState),
    /// `ST_SpentCoin`
    SpentCoin(SpentCoinState),
    /// `ST_BookKeeper`
    BookKeeper(BookKeeperState),
    /// `ST_Asset`
    Asset(AssetState),
    /// `ST_Contract`
    Contract(ContractState),
    /// `ST_Storage`
    Storage(StorageItem),
    /// `ST_ProgramCoin`
    ProgramCoin(ProgramUnspentCoin),
    /// `ST_Validator`
    Validator(ValidatorState),
    /// `ST_Vote`
    Vote(VoteState),
}

impl StateValue {
    /// Decode a state record under the schema its prefix selects.
    pub fn decode(prefix: DataEntryPrefix, bytes: &[u8]) -> Result<Self, LedgerError> {
        use DataEntryPrefix::*;
        let value = match prefix {
            StAccount => StateValue::Account(AccountState::from_bytes(bytes)?),
            StCoin => StateValue::Coin(UnspentCoinState::from_bytes(bytes)?),
            StSpentCoin => StateValue::SpentCoin(SpentCoinState::from_bytes(bytes)?),
            StBookKeeper => StateValue::BookKeeper(BookKeeperState::from_bytes(bytes)?),
            StAsset => StateValue::Asset(AssetState::from_bytes(bytes)?),
            StContract => StateValue::Contract(ContractState::from_bytes(bytes)?),
            StStorage => StateValue::Storage(StorageItem::from_bytes(bytes)?),
            StProgramCoin => StateValue::ProgramCoin(ProgramUnspentCoin::from_bytes(bytes)?),
            StValidator => StateValue::Validator(ValidatorState::from_bytes(bytes)?),
            StVote => StateValue::Vote(VoteState::from_bytes(bytes)?),
            other => {
                return Err(LedgerError::CorruptChain(format!(
                    "prefix {:#04x} does not hold state records",
                    other.byte()
                )))
            }
        };
        Ok(value)
    }

    /// Serialize under the deterministic codec.
    pub fn encode_bytes(&self) -> Vec<u8> {
        match self {
            StateValue::Account(v) => v.to_vec(),
            StateValue::Coin(v) => v.to_vec(),
            StateValue::SpentCoin(v) => v.to_vec(),
            StateValue::BookKeeper(v) => v.to_vec(),
            StateValue::Asset(v) => v.to_vec(),
            StateValue::Contract(v) => v.to_vec(),
            StateValue::Storage(v) => v.to_vec(),
            StateValue::ProgramCoin(v) => v.to_vec(),
            StateValue::Validator(v) => v.to_vec(),
            StateValue::Vote(v) => v.to_vec(),
        }
    }

    /// Content hash of the serialized value (the state tree leaf value).
    pub fn content_hash(&self) -> Hash {
        Hash::digest(&self.encode_bytes())
    }
}

macro_rules! state_accessors {
    ($variant:ident, $ty:ty, $as_ref:ident, $as_mut:ident, $expected:literal) => {
        impl StateValue {
            /// Borrow as this kind, or a kind-mismatch error.
            pub fn $as_ref(&self) -> Result<&$ty, LedgerError> {
                match self {
                    StateValue::$variant(v) => Ok(v),
                    _ => Err(LedgerError::StateKindMismatch {
                        expected: $expected,
                    }),
                }
            }

            /// Mutably borrow as this kind, or a kind-mismatch error.
            pub fn $as_mut(&mut self) -> Result<&mut $ty, LedgerError> {
                match self {
                    StateValue::$variant(v) => Ok(v),
                    _ => Err(LedgerError::StateKindMismatch {
                        expected: $expected,
                    }),
                }
            }
        }
    };
}

state_accessors!(Account, AccountState, as_account, as_account_mut, "account");
state_accessors!(Coin, UnspentCoinState, as_coin, as_coin_mut, "unspent coin");
state_accessors!(
    SpentCoin,
    SpentCoinState,
    as_spent_coin,
    as_spent_coin_mut,
    "spent coin"
);
state_accessors!(
    BookKeeper,
    BookKeeperState,
    as_book_keeper,
    as_book_keeper_mut,
    "bookkeeper set"
);
state_accessors!(Asset, AssetState, as_asset, as_asset_mut, "asset");
state_accessors!(
    ProgramCoin,
    ProgramUnspentCoin,
    as_program_coin,
    as_program_coin_mut,
    "program coin"
);

#[cfg(test)]
mod tests {
    use super::*;
    use chainloom_storage::keys;

    fn sample_account() -> AccountState {
        let mut account = AccountState::with_balance(
            Address::from_program(b"alice"),
            Hash::digest(b"gold"),
            Amount::from_whole(5),
        );
        account.credit(Hash::digest(b"silver"), Amount::from_whole(2));
        account
    }

    #[test]
    fn test_account_roundtrip_is_deterministic() {
        let account = sample_account();
        let bytes = account.to_vec();
        assert_eq!(bytes, sample_account().to_vec());
        assert_eq!(AccountState::from_bytes(&bytes).unwrap(), account);
    }

    #[test]
    fn test_decode_dispatches_on_prefix() {
        let account = sample_account();
        let bytes = account.to_vec();
        let decoded = StateValue::decode(DataEntryPrefix::StAccount, &bytes).unwrap();
        assert_eq!(decoded, StateValue::Account(account));
    }

    #[test]
    fn test_decode_rejects_non_state_prefix() {
        let bytes = sample_account().to_vec();
        assert!(StateValue::decode(DataEntryPrefix::DataHeader, &bytes).is_err());
    }

    #[test]
    fn test_cross_prefix_decode_misinterprets_or_fails() {
        // The prefix partition property: a record is only decodable under
        // its own prefix's schema.
        let account = sample_account();
        let bytes = account.to_vec();
        match StateValue::decode(DataEntryPrefix::StAsset, &bytes) {
            Err(_) => {}
            Ok(decoded) => assert_ne!(decoded, StateValue::Account(account)),
        }
        // And the key builders place every record under a distinct byte.
        let txid = Hash::digest(b"tx");
        assert_ne!(keys::coin_key(&txid)[0], keys::unspent_key(&txid)[0]);
    }

    #[test]
    fn test_bookkeeper_rotation() {
        let a = Address::from_program(b"a");
        let b = Address::from_program(b"b");
        let mut state = BookKeeperState::new(vec![a]);
        assert!(!state.rotate());

        assert!(state.add_next(b));
        assert!(!state.add_next(b));
        assert!(state.rotate());
        assert_eq!(state.current, state.next);

        assert!(state.remove_next(&b));
        assert!(!state.remove_next(&b));
        assert!(state.rotate());
        assert_eq!(state.current, vec![a]);
    }

    #[test]
    fn test_asset_issued() {
        let asset = AssetState {
            asset_id: Hash::digest(b"gold"),
            name: "gold".into(),
            precision: 8,
            amount: Amount::from_whole(100),
            available: Amount::from_whole(70),
            issuer: Address::from_program(b"issuer"),
            admin: Address::from_program(b"admin"),
            expiration: 4_000_000,
            is_frozen: false,
        };
        assert_eq!(asset.issued(), Amount::from_whole(30));
        let bytes = asset.to_vec();
        assert_eq!(AssetState::from_bytes(&bytes).unwrap(), asset);
    }

    #[test]
    fn test_unspent_coin_queries() {
        let mut coins = UnspentCoinState::confirmed(3);
        assert!(coins.is_unspent(0));
        assert!(coins.is_unspent(2));
        assert!(!coins.is_unspent(3));

        coins.items[1] = CoinState::Spent;
        assert!(!coins.is_unspent(1));

        let bytes = coins.to_vec();
        assert_eq!(UnspentCoinState::from_bytes(&bytes).unwrap(), coins);
    }

    #[test]
    fn test_program_coin_remove() {
        let txid = Hash::digest(b"tx");
        let mut coins = ProgramUnspentCoin {
            unspents: vec![
                ProgramCoin {
                    txid,
                    index: 0,
                    value: Amount::from_whole(1),
                },
                ProgramCoin {
                    txid,
                    index: 1,
                    value: Amount::from_whole(2),
                },
            ],
        };
        assert!(coins.remove(&txid, 0));
        assert!(!coins.remove(&txid, 0));
        assert_eq!(coins.unspents.len(), 1);
    }

    #[test]
    fn test_kind_accessors() {
        let mut value = StateValue::Account(sample_account());
        assert!(value.as_account().is_ok());
        assert!(value.as_asset().is_err());
        value.as_account_mut().unwrap().is_frozen = true;
        assert!(value.as_account().unwrap().is_frozen);
    }

    #[test]
    fn test_content_hash_tracks_mutation() {
        let mut value = StateValue::Account(sample_account());
        let before = value.content_hash();
        value
            .as_account_mut()
            .unwrap()
            .credit(Hash::digest(b"gold"), Amount::from_whole(1));
        assert_ne!(before, value.content_hash());
    }
}
