//! The ledger actor: a message-passing facade over the chain store.
//!
//! Every ledger mutation and query reaches the store through this actor,
//! making it a single-writer, many-reader service behind its mailbox.
//! `receive` is total over [`LedgerRequest`]; any other message type is
//! logged and dropped — senders of unsupported types get no reply and
//! must rely on their own timeout.

use crate::chain_store::ChainStore;
use crate::messages::{LedgerReply, LedgerRequest};
use chainloom_actor::{Actor, Context, Message, Props};
use chainloom_types::Header;
use std::sync::Arc;

/// Actor owning exclusive access to a [`ChainStore`].
pub struct LedgerActor {
    store: Arc<ChainStore>,
}

impl LedgerActor {
    /// Wrap a chain store.
    pub fn new(store: Arc<ChainStore>) -> Self {
        Self { store }
    }

    /// Props producing this actor for spawning.
    pub fn props(store: Arc<ChainStore>) -> Props {
        Props::from_producer(move || LedgerActor::new(store.clone()))
    }

    fn handle(&self, request: &LedgerRequest) -> LedgerReply {
        let store = &self.store;
        match request {
            LedgerRequest::AddHeaders(headers) => {
                let hashes: Vec<_> = headers.iter().map(Header::hash).collect();
                LedgerReply::HeadersAdded(
                    store.add_headers(headers.clone()).map(|()| hashes),
                )
            }
            LedgerRequest::SaveBlock(block) => {
                let hash = block.hash();
                // The persist handle is the direct API's durability signal;
                // the actor protocol acknowledges acceptance only.
                LedgerReply::BlockSaved(store.save_block(block.clone()).map(|_handle| hash))
            }
            LedgerRequest::GetTransaction(hash) => {
                LedgerReply::Transaction(store.get_transaction(hash))
            }
            LedgerRequest::GetTransactionWithHeight(hash) => {
                LedgerReply::TransactionWithHeight(store.get_transaction_with_height(hash))
            }
            LedgerRequest::GetBlockByHash(hash) => LedgerReply::Block(store.get_block(hash)),
            LedgerRequest::GetBlockByHeight(height) => {
                LedgerReply::Block(store.get_block_by_height(*height))
            }
            LedgerRequest::GetHeaderByHash(hash) => LedgerReply::Header(store.get_header(hash)),
            LedgerRequest::GetHeaderByHeight(height) => {
                LedgerReply::Header(store.get_header_by_height(*height))
            }
            LedgerRequest::GetBlockHash(height) => {
                LedgerReply::BlockHash(store.get_block_hash(*height))
            }
            LedgerRequest::GetCurrentBlockHash => {
                LedgerReply::CurrentBlockHash(Ok(store.current_block_hash()))
            }
            LedgerRequest::GetCurrentBlockHeight => {
                LedgerReply::CurrentBlockHeight(Ok(store.current_block_height()))
            }
            LedgerRequest::GetCurrentHeaderHash => {
                LedgerReply::CurrentHeaderHash(Ok(store.current_header_hash()))
            }
            LedgerRequest::GetCurrentHeaderHeight => {
                LedgerReply::CurrentHeaderHeight(Ok(store.current_header_height()))
            }
            LedgerRequest::ContainsBlock(hash) => {
                LedgerReply::ContainsBlock(store.is_block_in_store(hash))
            }
            LedgerRequest::ContainsTransaction(hash) => {
                LedgerReply::ContainsTransaction(store.is_tx_in_store(hash))
            }
            LedgerRequest::GetAsset(asset_id) => LedgerReply::Asset(store.get_asset(asset_id)),
            LedgerRequest::GetContract(code_hash) => {
                LedgerReply::Contract(store.get_contract(code_hash))
            }
            LedgerRequest::GetAccount(address) => {
                LedgerReply::Account(store.get_account(address))
            }
            LedgerRequest::GetStorageItem(key) => {
                LedgerReply::StorageItem(store.get_storage_item(key))
            }
            LedgerRequest::GetBookKeepers => LedgerReply::BookKeepers(store.get_book_keepers()),
            LedgerRequest::GetCurrentStateRoot => {
                LedgerReply::CurrentStateRoot(Ok(store.get_current_state_root()))
            }
            LedgerRequest::GetBlockRootWithNewTxRoot(tx_root) => {
                LedgerReply::BlockRootWithNewTxRoot(
                    Ok(store.get_block_root_with_new_tx_root(*tx_root)),
                )
            }
            LedgerRequest::GetQuantityIssued(asset_id) => {
                LedgerReply::QuantityIssued(store.get_quantity_issued(asset_id))
            }
            LedgerRequest::ContainsUnspent { txid, index } => {
                LedgerReply::ContainsUnspent(store.contains_unspent(txid, *index))
            }
        }
    }
}

impl Actor for LedgerActor {
    fn receive(&mut self, ctx: &mut Context<'_>, message: Message) {
        let Some(request) = message.downcast_ref::<LedgerRequest>() else {
            tracing::warn!("ledger actor dropping unsupported message type");
            return;
        };
        let reply = self.handle(request);
        ctx.respond(reply);
    }
}
