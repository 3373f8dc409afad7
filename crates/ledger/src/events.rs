//! Chain events published on the system event stream.

use chainloom_types::Hash;

/// Published after a block becomes durable, in strict height order.
#[derive(Debug, Clone)]
pub struct BlockPersisted {
    /// Height of the persisted block.
    pub height: u32,
    /// Hash of the persisted block.
    pub hash: Hash,
    /// Number of transactions it carried.
    pub tx_count: usize,
}
