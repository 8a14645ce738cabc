use std::collections::BTreeMap;

use alloy_primitives::{B256, Bytes};

/// A raw block fetched from the content-addressed store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IpldBlock {
    pub cid: String,
    pub data: Bytes,
}

/// Raw blocks fetched for one [`CidWrapper`](super::CidWrapper).
///
/// Blocks that could not be fetched are simply absent, so the lengths here
/// may be shorter than the CID lists they were fetched from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IpldWrapper {
    pub block_number: u64,
    pub headers: Vec<IpldBlock>,
    pub uncles: Vec<IpldBlock>,
    pub transactions: Vec<IpldBlock>,
    pub receipts: Vec<IpldBlock>,
    pub state_nodes: BTreeMap<B256, IpldBlock>,
    pub storage_nodes: BTreeMap<B256, BTreeMap<B256, IpldBlock>>,
}
