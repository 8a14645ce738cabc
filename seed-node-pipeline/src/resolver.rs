//! Resolver module for the seed node pipeline.
//!
//! Reassembles fetched raw blocks into the [`ResponsePayload`] shape the
//! live filterer produces, so a subscriber receives the same structure
//! whether a block reached it live or through a backfill.
use seed_node_shared::types::{IpldBlock, IpldWrapper, ResponsePayload};

/// Trait for resolving raw block sets into client responses.
pub trait IpldResolver: Send + Sync {
    fn resolve(&self, blocks: IpldWrapper) -> ResponsePayload;
}

#[derive(Clone, Debug, Default)]
pub struct EthIpldResolver;

impl EthIpldResolver {
    pub fn new() -> Self {
        Self
    }
}

fn data(blocks: Vec<IpldBlock>) -> Vec<alloy_primitives::Bytes> {
    blocks.into_iter().map(|block| block.data).collect()
}

impl IpldResolver for EthIpldResolver {
    fn resolve(&self, blocks: IpldWrapper) -> ResponsePayload {
        ResponsePayload {
            block_number: blocks.block_number,
            headers: data(blocks.headers),
            uncles: data(blocks.uncles),
            transactions: data(blocks.transactions),
            receipts: data(blocks.receipts),
            state_nodes: blocks
                .state_nodes
                .into_iter()
                .map(|(key, block)| (key, block.data))
                .collect(),
            storage_nodes: blocks
                .storage_nodes
                .into_iter()
                .map(|(state_key, nodes)| {
                    let nodes = nodes
                        .into_iter()
                        .map(|(key, block)| (key, block.data))
                        .collect();
                    (state_key, nodes)
                })
                .collect(),
            err_msg: None,
        }
    }
}
