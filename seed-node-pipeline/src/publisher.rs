//! Publisher module for the seed node pipeline.
//!
//! Writes every object of a converted block to the content-addressed store
//! and collects the returned CIDs, with their indexing metadata, into a
//! [`CidPayload`] ready for the repository.
use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::{Bytes, keccak256};
use async_trait::async_trait;
use futures::future::try_join_all;
use ipfs::{Codec, IpfsBlockStore};
use seed_node_shared::types::{
    CidPayload, ConvertedPayload, ReceiptCid, StateNodeCid, StorageNodeCid, TxCid, UncleCid,
};

use crate::errors::PublishError;

/// Trait for publishing converted payloads.
#[async_trait]
pub trait IpldPublisher: Send + Sync {
    /// Publishes every object of `payload` and returns their CIDs.
    ///
    /// Any failure, including a partial publish, is an error and the
    /// returned CIDs must not be indexed.
    async fn publish(&self, payload: &ConvertedPayload) -> Result<CidPayload, PublishError>;
}

pub struct EthIpldPublisher {
    store: Arc<dyn IpfsBlockStore>,
}

fn check_count(kind: &'static str, expected: usize, actual: usize) -> Result<(), PublishError> {
    if expected != actual {
        return Err(PublishError::CountMismatch {
            kind,
            expected,
            actual,
        });
    }
    Ok(())
}

impl EthIpldPublisher {
    pub fn new(store: Arc<dyn IpfsBlockStore>) -> Self {
        Self { store }
    }

    async fn put_all(&self, codec: Codec, objects: &[Bytes]) -> Result<Vec<String>, PublishError> {
        let cids = try_join_all(
            objects
                .iter()
                .map(|object| self.store.put_block(codec, object)),
        )
        .await?;
        Ok(cids)
    }
}

#[async_trait]
impl IpldPublisher for EthIpldPublisher {
    async fn publish(&self, payload: &ConvertedPayload) -> Result<CidPayload, PublishError> {
        let header_cids = self
            .put_all(Codec::EthBlock, std::slice::from_ref(&payload.header_rlp))
            .await?;
        check_count("header", 1, header_cids.len())?;

        let uncle_cids = self.put_all(Codec::EthBlock, &payload.uncles).await?;
        check_count("uncle", payload.uncles.len(), uncle_cids.len())?;

        check_count("transaction metadata", payload.transactions.len(), payload.trx_meta.len())?;
        let tx_cids = self.put_all(Codec::EthTx, &payload.transactions).await?;
        check_count("transaction", payload.trx_meta.len(), tx_cids.len())?;

        check_count("receipt metadata", payload.receipts.len(), payload.receipt_meta.len())?;
        let receipt_cids = self.put_all(Codec::EthTxReceipt, &payload.receipts).await?;
        check_count("receipt", payload.receipt_meta.len(), receipt_cids.len())?;

        let mut state_node_cids = Vec::with_capacity(payload.state_nodes.len());
        for (state_key, node) in &payload.state_nodes {
            state_node_cids.push(StateNodeCid {
                state_key: *state_key,
                cid: self.store.put_block(Codec::EthStateTrie, &node.value).await?,
                leaf: node.leaf,
            });
        }

        let mut storage_node_cids = BTreeMap::new();
        for (state_key, nodes) in &payload.storage_nodes {
            if !payload.state_nodes.contains_key(state_key) {
                return Err(PublishError::OrphanStorage(*state_key));
            }
            let mut cids = Vec::with_capacity(nodes.len());
            for (storage_key, node) in nodes {
                cids.push(StorageNodeCid {
                    storage_key: *storage_key,
                    cid: self.store.put_block(Codec::EthStorageTrie, &node.value).await?,
                    leaf: node.leaf,
                });
            }
            storage_node_cids.insert(*state_key, cids);
        }

        Ok(CidPayload {
            block_number: payload.block_number,
            block_hash: payload.block_hash,
            header_cid: header_cids.into_iter().next().unwrap_or_default(),
            uncle_cids: payload
                .uncles
                .iter()
                .zip(uncle_cids)
                .map(|(uncle, cid)| UncleCid {
                    block_hash: keccak256(uncle),
                    cid,
                })
                .collect(),
            transaction_cids: payload
                .trx_meta
                .iter()
                .zip(tx_cids)
                .enumerate()
                .map(|(index, (meta, cid))| TxCid {
                    tx_hash: meta.tx_hash,
                    index: index as u32,
                    cid,
                    src: meta.src,
                    dst: meta.dst,
                })
                .collect(),
            receipt_cids: payload
                .receipt_meta
                .iter()
                .zip(receipt_cids)
                .map(|(meta, cid)| {
                    (
                        meta.tx_hash,
                        ReceiptCid {
                            cid,
                            contract: meta.contract_address,
                            topic0s: meta.topic0s.clone(),
                        },
                    )
                })
                .collect(),
            state_node_cids,
            storage_node_cids,
        })
    }
}
