//! The ledger actor's message contract.
//!
//! A closed set of typed requests, each mapped one-to-one to a chain store
//! operation, with a mirrored reply set. Every payload-carrying reply
//! wraps a `Result` so domain failures travel the same channel as the
//! payload; request/response correlation comes entirely from the future
//! pid mechanism, never from ids in the payload.

use crate::states::{AccountState, AssetState, BookKeeperState, ContractState, StorageItem};
use crate::LedgerError;
use chainloom_types::{Address, Amount, Block, Hash, Header, Transaction};

/// Requests the ledger actor accepts.
#[derive(Debug, Clone)]
pub enum LedgerRequest {
    /// Append a batch of headers.
    AddHeaders(Vec<Header>),
    /// Accept a block for persistence.
    SaveBlock(Block),
    /// Transaction body by hash.
    GetTransaction(Hash),
    /// Transaction body plus confirmation height.
    GetTransactionWithHeight(Hash),
    /// Block by hash, bodies hydrated.
    GetBlockByHash(Hash),
    /// Block by height.
    GetBlockByHeight(u32),
    /// Header by hash.
    GetHeaderByHash(Hash),
    /// Header by height.
    GetHeaderByHeight(u32),
    /// Block hash at a height.
    GetBlockHash(u32),
    /// Hash of the latest durable block.
    GetCurrentBlockHash,
    /// Height of the latest durable block.
    GetCurrentBlockHeight,
    /// Hash of the latest indexed header.
    GetCurrentHeaderHash,
    /// Height of the latest indexed header.
    GetCurrentHeaderHeight,
    /// Whether a block is durably stored.
    ContainsBlock(Hash),
    /// Whether a transaction body is stored.
    ContainsTransaction(Hash),
    /// Asset registration by id.
    GetAsset(Hash),
    /// Contract record by code hash.
    GetContract(Hash),
    /// Account state by address.
    GetAccount(Address),
    /// Contract storage entry by raw key.
    GetStorageItem(Vec<u8>),
    /// The bookkeeper sets.
    GetBookKeepers,
    /// Latest committed state root.
    GetCurrentStateRoot,
    /// Block merkle root with a candidate tx root appended.
    GetBlockRootWithNewTxRoot(Hash),
    /// Issued amount of an asset.
    GetQuantityIssued(Hash),
    /// Whether an output is still unspent.
    ContainsUnspent {
        /// Referenced transaction.
        txid: Hash,
        /// Referenced output index.
        index: u16,
    },
}

/// Replies, one variant per request.
#[derive(Debug, Clone)]
pub enum LedgerReply {
    /// Hashes of the headers submitted, or why the batch stopped.
    HeadersAdded(Result<Vec<Hash>, LedgerError>),
    /// Hash of the accepted block. Acceptance, not durability.
    BlockSaved(Result<Hash, LedgerError>),
    /// Reply to [`LedgerRequest::GetTransaction`].
    Transaction(Result<Transaction, LedgerError>),
    /// Reply to [`LedgerRequest::GetTransactionWithHeight`].
    TransactionWithHeight(Result<(Transaction, u32), LedgerError>),
    /// Reply to the block queries.
    Block(Result<Block, LedgerError>),
    /// Reply to the header queries.
    Header(Result<Header, LedgerError>),
    /// Reply to [`LedgerRequest::GetBlockHash`].
    BlockHash(Result<Hash, LedgerError>),
    /// Reply to [`LedgerRequest::GetCurrentBlockHash`].
    CurrentBlockHash(Result<Hash, LedgerError>),
    /// Reply to [`LedgerRequest::GetCurrentBlockHeight`].
    CurrentBlockHeight(Result<u32, LedgerError>),
    /// Reply to [`LedgerRequest::GetCurrentHeaderHash`].
    CurrentHeaderHash(Result<Hash, LedgerError>),
    /// Reply to [`LedgerRequest::GetCurrentHeaderHeight`].
    CurrentHeaderHeight(Result<u32, LedgerError>),
    /// Reply to [`LedgerRequest::ContainsBlock`].
    ContainsBlock(Result<bool, LedgerError>),
    /// Reply to [`LedgerRequest::ContainsTransaction`].
    ContainsTransaction(Result<bool, LedgerError>),
    /// Reply to [`LedgerRequest::GetAsset`].
    Asset(Result<AssetState, LedgerError>),
    /// Reply to [`LedgerRequest::GetContract`].
    Contract(Result<ContractState, LedgerError>),
    /// Reply to [`LedgerRequest::GetAccount`].
    Account(Result<AccountState, LedgerError>),
    /// Reply to [`LedgerRequest::GetStorageItem`].
    StorageItem(Result<StorageItem, LedgerError>),
    /// Reply to [`LedgerRequest::GetBookKeepers`].
    BookKeepers(Result<BookKeeperState, LedgerError>),
    /// Reply to [`LedgerRequest::GetCurrentStateRoot`].
    CurrentStateRoot(Result<Hash, LedgerError>),
    /// Reply to [`LedgerRequest::GetBlockRootWithNewTxRoot`].
    BlockRootWithNewTxRoot(Result<Hash, LedgerError>),
    /// Reply to [`LedgerRequest::GetQuantityIssued`].
    QuantityIssued(Result<Amount, LedgerError>),
    /// Reply to [`LedgerRequest::ContainsUnspent`].
    ContainsUnspent(Result<bool, LedgerError>),
}
