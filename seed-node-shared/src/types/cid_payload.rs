use std::collections::BTreeMap;

use alloy_primitives::{Address, B256};

/// CID of an uncle header, keyed by the uncle's own hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UncleCid {
    pub block_hash: B256,
    pub cid: String,
}

/// CID of a transaction with the metadata indexed alongside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxCid {
    pub tx_hash: B256,
    /// Position of the transaction in its block.
    pub index: u32,
    pub cid: String,
    pub src: Address,
    pub dst: Address,
}

/// CID of a receipt with the metadata indexed alongside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptCid {
    pub cid: String,
    pub contract: Address,
    pub topic0s: Vec<B256>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateNodeCid {
    pub state_key: B256,
    pub cid: String,
    pub leaf: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageNodeCid {
    pub storage_key: B256,
    pub cid: String,
    pub leaf: bool,
}

/// A storage node CID together with the state key it hangs under, as
/// returned by retrieval.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageNodeWithStateKeyCid {
    pub state_key: B256,
    pub storage_key: B256,
    pub cid: String,
    pub leaf: bool,
}

/// Everything the publisher produced for one block, ready to be indexed.
///
/// Receipts are keyed by the hash of the transaction that owns them and
/// storage nodes by the state key of the account that owns them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CidPayload {
    pub block_number: u64,
    pub block_hash: B256,
    pub header_cid: String,
    pub uncle_cids: Vec<UncleCid>,
    pub transaction_cids: Vec<TxCid>,
    pub receipt_cids: BTreeMap<B256, ReceiptCid>,
    pub state_node_cids: Vec<StateNodeCid>,
    pub storage_node_cids: BTreeMap<B256, Vec<StorageNodeCid>>,
}

/// The CIDs matching a filter at one block height, as produced by the retriever.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CidWrapper {
    pub block_number: u64,
    pub headers: Vec<String>,
    pub uncles: Vec<String>,
    pub transactions: Vec<String>,
    pub receipts: Vec<String>,
    pub state_nodes: Vec<StateNodeCid>,
    pub storage_nodes: Vec<StorageNodeWithStateKeyCid>,
}

impl CidWrapper {
    pub fn new(block_number: u64) -> Self {
        Self {
            block_number,
            ..Default::default()
        }
    }

    /// True when no category matched anything at this height.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
            && self.uncles.is_empty()
            && self.transactions.is_empty()
            && self.receipts.is_empty()
            && self.state_nodes.is_empty()
            && self.storage_nodes.is_empty()
    }
}
