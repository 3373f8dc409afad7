//! Typed client over the ledger actor.
//!
//! Wraps a ledger actor pid with one blocking method per request. Each
//! call goes through a reply future; a timeout or a mismatched reply
//! becomes [`LedgerError::ActorComm`] carrying the underlying actor error
//! as its source — the root cause is preserved, not replaced.

use crate::messages::{LedgerReply, LedgerRequest};
use crate::states::{AccountState, AssetState, BookKeeperState, ContractState, StorageItem};
use crate::LedgerError;
use chainloom_actor::{ActorError, ActorSystem, Pid};
use chainloom_types::{Address, Amount, Block, Hash, Header, Transaction};
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Blocking, typed access to a ledger actor.
#[derive(Clone)]
pub struct LedgerClient {
    system: ActorSystem,
    pid: Pid,
    timeout: Duration,
}

impl LedgerClient {
    /// Client for the ledger actor at `pid`.
    pub fn new(system: ActorSystem, pid: Pid) -> Self {
        Self {
            system,
            pid,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The ledger actor this client talks to.
    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    fn call(&self, request: LedgerRequest) -> Result<LedgerReply, LedgerError> {
        self.system
            .request_future(&self.pid, request, self.timeout)
            .result_as::<LedgerReply>()
            .map(|reply| (*reply).clone())
            .map_err(|e| {
                tracing::error!(pid = %self.pid, error = %e, "ledger request failed");
                LedgerError::ActorComm(e)
            })
    }

    fn unexpected<T>(expected: &'static str) -> Result<T, LedgerError> {
        Err(LedgerError::ActorComm(ActorError::UnexpectedResponse {
            expected,
        }))
    }

    /// Append a batch of headers; returns their hashes.
    pub fn add_headers(&self, headers: Vec<Header>) -> Result<Vec<Hash>, LedgerError> {
        match self.call(LedgerRequest::AddHeaders(headers))? {
            LedgerReply::HeadersAdded(result) => result,
            _ => Self::unexpected("HeadersAdded"),
        }
    }

    /// Append a single header.
    pub fn add_header(&self, header: Header) -> Result<Hash, LedgerError> {
        let mut hashes = self.add_headers(vec![header])?;
        hashes
            .pop()
            .ok_or(LedgerError::CorruptChain("empty header batch reply".into()))
    }

    /// Submit a block for persistence; returns its hash on acceptance.
    pub fn save_block(&self, block: Block) -> Result<Hash, LedgerError> {
        match self.call(LedgerRequest::SaveBlock(block))? {
            LedgerReply::BlockSaved(result) => result,
            _ => Self::unexpected("BlockSaved"),
        }
    }

    /// Transaction body by hash.
    pub fn get_transaction(&self, hash: Hash) -> Result<Transaction, LedgerError> {
        match self.call(LedgerRequest::GetTransaction(hash))? {
            LedgerReply::Transaction(result) => result,
            _ => Self::unexpected("Transaction"),
        }
    }

    /// Transaction body plus confirmation height.
    pub fn get_transaction_with_height(
        &self,
        hash: Hash,
    ) -> Result<(Transaction, u32), LedgerError> {
        match self.call(LedgerRequest::GetTransactionWithHeight(hash))? {
            LedgerReply::TransactionWithHeight(result) => result,
            _ => Self::unexpected("TransactionWithHeight"),
        }
    }

    /// Block by hash.
    pub fn get_block(&self, hash: Hash) -> Result<Block, LedgerError> {
        match self.call(LedgerRequest::GetBlockByHash(hash))? {
            LedgerReply::Block(result) => result,
            _ => Self::unexpected("Block"),
        }
    }

    /// Block by height.
    pub fn get_block_by_height(&self, height: u32) -> Result<Block, LedgerError> {
        match self.call(LedgerRequest::GetBlockByHeight(height))? {
            LedgerReply::Block(result) => result,
            _ => Self::unexpected("Block"),
        }
    }

    /// Header by hash.
    pub fn get_header(&self, hash: Hash) -> Result<Header, LedgerError> {
        match self.call(LedgerRequest::GetHeaderByHash(hash))? {
            LedgerReply::Header(result) => result,
            _ => Self::unexpected("Header"),
        }
    }

    /// Header by height.
    pub fn get_header_by_height(&self, height: u32) -> Result<Header, LedgerError> {
        match self.call(LedgerRequest::GetHeaderByHeight(height))? {
            LedgerReply::Header(result) => result,
            _ => Self::unexpected("Header"),
        }
    }

    /// Block hash at a height.
    pub fn get_block_hash(&self, height: u32) -> Result<Hash, LedgerError> {
        match self.call(LedgerRequest::GetBlockHash(height))? {
            LedgerReply::BlockHash(result) => result,
            _ => Self::unexpected("BlockHash"),
        }
    }

    /// Hash of the latest durable block.
    pub fn get_current_block_hash(&self) -> Result<Hash, LedgerError> {
        match self.call(LedgerRequest::GetCurrentBlockHash)? {
            LedgerReply::CurrentBlockHash(result) => result,
            _ => Self::unexpected("CurrentBlockHash"),
        }
    }

    /// Height of the latest durable block.
    pub fn get_current_block_height(&self) -> Result<u32, LedgerError> {
        match self.call(LedgerRequest::GetCurrentBlockHeight)? {
            LedgerReply::CurrentBlockHeight(result) => result,
            _ => Self::unexpected("CurrentBlockHeight"),
        }
    }

    /// Hash of the latest indexed header.
    pub fn get_current_header_hash(&self) -> Result<Hash, LedgerError> {
        match self.call(LedgerRequest::GetCurrentHeaderHash)? {
            LedgerReply::CurrentHeaderHash(result) => result,
            _ => Self::unexpected("CurrentHeaderHash"),
        }
    }

    /// Height of the latest indexed header.
    pub fn get_current_header_height(&self) -> Result<u32, LedgerError> {
        match self.call(LedgerRequest::GetCurrentHeaderHeight)? {
            LedgerReply::CurrentHeaderHeight(result) => result,
            _ => Self::unexpected("CurrentHeaderHeight"),
        }
    }

    /// Whether a block is durably stored.
    pub fn contains_block(&self, hash: Hash) -> Result<bool, LedgerError> {
        match self.call(LedgerRequest::ContainsBlock(hash))? {
            LedgerReply::ContainsBlock(result) => result,
            _ => Self::unexpected("ContainsBlock"),
        }
    }

    /// Whether a transaction body is stored.
    pub fn contains_transaction(&self, hash: Hash) -> Result<bool, LedgerError> {
        match self.call(LedgerRequest::ContainsTransaction(hash))? {
            LedgerReply::ContainsTransaction(result) => result,
            _ => Self::unexpected("ContainsTransaction"),
        }
    }

    /// Asset registration by id.
    pub fn get_asset(&self, asset_id: Hash) -> Result<AssetState, LedgerError> {
        match self.call(LedgerRequest::GetAsset(asset_id))? {
            LedgerReply::Asset(result) => result,
            _ => Self::unexpected("Asset"),
        }
    }

    /// Contract record by code hash.
    pub fn get_contract(&self, code_hash: Hash) -> Result<ContractState, LedgerError> {
        match self.call(LedgerRequest::GetContract(code_hash))? {
            LedgerReply::Contract(result) => result,
            _ => Self::unexpected("Contract"),
        }
    }

    /// Account state by address.
    pub fn get_account(&self, address: Address) -> Result<AccountState, LedgerError> {
        match self.call(LedgerRequest::GetAccount(address))? {
            LedgerReply::Account(result) => result,
            _ => Self::unexpected("Account"),
        }
    }

    /// Contract storage entry by raw key.
    pub fn get_storage_item(&self, key: Vec<u8>) -> Result<StorageItem, LedgerError> {
        match self.call(LedgerRequest::GetStorageItem(key))? {
            LedgerReply::StorageItem(result) => result,
            _ => Self::unexpected("StorageItem"),
        }
    }

    /// The bookkeeper sets.
    pub fn get_book_keepers(&self) -> Result<BookKeeperState, LedgerError> {
        match self.call(LedgerRequest::GetBookKeepers)? {
            LedgerReply::BookKeepers(result) => result,
            _ => Self::unexpected("BookKeepers"),
        }
    }

    /// Latest committed state root.
    pub fn get_current_state_root(&self) -> Result<Hash, LedgerError> {
        match self.call(LedgerRequest::GetCurrentStateRoot)? {
            LedgerReply::CurrentStateRoot(result) => result,
            _ => Self::unexpected("CurrentStateRoot"),
        }
    }

    /// Block merkle root with a candidate tx root appended.
    pub fn get_block_root_with_new_tx_root(&self, tx_root: Hash) -> Result<Hash, LedgerError> {
        match self.call(LedgerRequest::GetBlockRootWithNewTxRoot(tx_root))? {
            LedgerReply::BlockRootWithNewTxRoot(result) => result,
            _ => Self::unexpected("BlockRootWithNewTxRoot"),
        }
    }

    /// Issued amount of an asset.
    pub fn get_quantity_issued(&self, asset_id: Hash) -> Result<Amount, LedgerError> {
        match self.call(LedgerRequest::GetQuantityIssued(asset_id))? {
            LedgerReply::QuantityIssued(result) => result,
            _ => Self::unexpected("QuantityIssued"),
        }
    }

    /// Whether an output is still unspent.
    pub fn contains_unspent(&self, txid: Hash, index: u16) -> Result<bool, LedgerError> {
        match self.call(LedgerRequest::ContainsUnspent { txid, index })? {
            LedgerReply::ContainsUnspent(result) => result,
            _ => Self::unexpected("ContainsUnspent"),
        }
    }
}
