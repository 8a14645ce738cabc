use std::collections::BTreeMap;

use alloy_primitives::{Address, B256, Bytes};

/// A trie node value flagged as leaf or intermediate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrieNode {
    pub value: Bytes,
    pub leaf: bool,
}

/// Indexing metadata derived from a transaction at conversion time.
///
/// `dst` is the zero address for contract creations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrxMetaData {
    pub tx_hash: B256,
    pub src: Address,
    pub dst: Address,
}

/// Indexing metadata derived from a receipt at conversion time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptMetaData {
    pub tx_hash: B256,
    /// The called contract, or the created one for contract creations.
    pub contract_address: Address,
    /// First topic of every log, in log order.
    pub topic0s: Vec<B256>,
}

/// The structured decoding of one [`RawPayload`](super::RawPayload).
///
/// Transactions and receipts are index-aligned with their metadata vectors.
/// Storage nodes are keyed first by the state key of the account that owns them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvertedPayload {
    pub block_number: u64,
    pub block_hash: B256,
    pub header_rlp: Bytes,
    pub uncles: Vec<Bytes>,
    pub transactions: Vec<Bytes>,
    pub trx_meta: Vec<TrxMetaData>,
    pub receipts: Vec<Bytes>,
    pub receipt_meta: Vec<ReceiptMetaData>,
    pub state_nodes: BTreeMap<B256, TrieNode>,
    pub storage_nodes: BTreeMap<B256, BTreeMap<B256, TrieNode>>,
}
