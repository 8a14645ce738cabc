//! Filterer module for the seed node pipeline.
//!
//! Screens a freshly converted block against a subscriber's filter. The
//! matching rules are the ones the CID retriever applies to indexed rows, so
//! live output and backfilled output agree for the same filter and block.
use std::collections::BTreeMap;

use seed_node_shared::types::{ConvertedPayload, FilterConfig, ResponsePayload};

/// Trait for filtering converted payloads for live subscribers.
pub trait ResponseFilterer: Send + Sync {
    fn filter(&self, filter: &FilterConfig, payload: &ConvertedPayload) -> ResponsePayload;
}

#[derive(Clone, Debug, Default)]
pub struct EthResponseFilterer;

impl EthResponseFilterer {
    pub fn new() -> Self {
        Self
    }
}

impl ResponseFilterer for EthResponseFilterer {
    fn filter(&self, filter: &FilterConfig, payload: &ConvertedPayload) -> ResponsePayload {
        let mut response = ResponsePayload::new(payload.block_number);
        if !filter.in_range(payload.block_number) {
            return response;
        }

        if !filter.header_filter.off {
            response.headers.push(payload.header_rlp.clone());
            if !filter.header_filter.final_only {
                response.uncles = payload.uncles.clone();
            }
        }

        let mut selected = vec![false; payload.transactions.len()];
        if !filter.trx_filter.off {
            for (index, (tx, meta)) in payload.transactions.iter().zip(&payload.trx_meta).enumerate() {
                if filter.trx_filter.matches(&meta.src, &meta.dst) {
                    selected[index] = true;
                    response.transactions.push(tx.clone());
                }
            }
        }

        if !filter.receipt_filter.off {
            for (index, (receipt, meta)) in
                payload.receipts.iter().zip(&payload.receipt_meta).enumerate()
            {
                let tx_selected = selected.get(index).copied().unwrap_or(false);
                if filter.includes_receipt(tx_selected, &meta.contract_address, &meta.topic0s) {
                    response.receipts.push(receipt.clone());
                }
            }
        }

        if !filter.state_filter.off {
            let keys = filter.state_filter.keys();
            for (state_key, node) in &payload.state_nodes {
                let key_match = keys.is_empty() || keys.contains(state_key);
                if key_match && (node.leaf || filter.state_filter.intermediate_nodes) {
                    response.state_nodes.insert(*state_key, node.value.clone());
                }
            }
        }

        if !filter.storage_filter.off {
            let storage_filter = &filter.storage_filter;
            let state_keys = storage_filter.state_keys();
            for (state_key, nodes) in &payload.storage_nodes {
                if !(state_keys.is_empty() || state_keys.contains(state_key)) {
                    continue;
                }
                let matched: BTreeMap<_, _> = nodes
                    .iter()
                    .filter(|(storage_key, node)| {
                        let key_match = storage_filter.storage_keys.is_empty()
                            || storage_filter.storage_keys.contains(storage_key);
                        key_match && (node.leaf || storage_filter.intermediate_nodes)
                    })
                    .map(|(storage_key, node)| (*storage_key, node.value.clone()))
                    .collect();
                if !matched.is_empty() {
                    response.storage_nodes.insert(*state_key, matched);
                }
            }
        }

        response
    }
}
