//! Fetcher module for the seed node pipeline.
//!
//! Reads the raw blocks behind a [`CidWrapper`] back out of the
//! content-addressed store. Fetching is best-effort: a block the store does
//! not have is left out of the result instead of failing the whole set.
use std::sync::Arc;

use alloy_primitives::Bytes;
use async_trait::async_trait;
use futures::future::try_join_all;
use ipfs::{IpfsBlockStore, IpfsError};
use seed_node_shared::types::{CidWrapper, IpldBlock, IpldWrapper};
use tracing::debug;

use crate::errors::QueryError;

/// Trait for fetching raw blocks by CID.
#[async_trait]
pub trait IpldFetcher: Send + Sync {
    /// Fetches every block named in `cids`.
    ///
    /// Missing blocks are absent from the result, so callers must reconcile
    /// by presence and never by count. Any other store failure is an error.
    async fn fetch(&self, cids: &CidWrapper) -> Result<IpldWrapper, QueryError>;
}

pub struct EthIpldFetcher {
    store: Arc<dyn IpfsBlockStore>,
}

impl EthIpldFetcher {
    pub fn new(store: Arc<dyn IpfsBlockStore>) -> Self {
        Self { store }
    }

    async fn fetch_one(&self, cid: &str) -> Result<Option<IpldBlock>, QueryError> {
        match self.store.get_block(cid).await {
            Ok(data) => Ok(Some(IpldBlock {
                cid: cid.to_string(),
                data: Bytes::from(data),
            })),
            Err(IpfsError::NotFound(_)) => {
                debug!(cid, "Block missing from store, skipping");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_all(&self, cids: &[String]) -> Result<Vec<IpldBlock>, QueryError> {
        let blocks = try_join_all(cids.iter().map(|cid| self.fetch_one(cid))).await?;
        Ok(blocks.into_iter().flatten().collect())
    }
}

#[async_trait]
impl IpldFetcher for EthIpldFetcher {
    async fn fetch(&self, cids: &CidWrapper) -> Result<IpldWrapper, QueryError> {
        let mut wrapper = IpldWrapper {
            block_number: cids.block_number,
            headers: self.fetch_all(&cids.headers).await?,
            uncles: self.fetch_all(&cids.uncles).await?,
            transactions: self.fetch_all(&cids.transactions).await?,
            receipts: self.fetch_all(&cids.receipts).await?,
            ..Default::default()
        };

        for node in &cids.state_nodes {
            if let Some(block) = self.fetch_one(&node.cid).await? {
                wrapper.state_nodes.insert(node.state_key, block);
            }
        }
        for node in &cids.storage_nodes {
            if let Some(block) = self.fetch_one(&node.cid).await? {
                wrapper
                    .storage_nodes
                    .entry(node.state_key)
                    .or_default()
                    .insert(node.storage_key, block);
            }
        }

        Ok(wrapper)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use ipfs::{Codec, MockIpfsClient};
    use seed_node_shared::types::{StateNodeCid, StorageNodeWithStateKeyCid};

    use super::*;

    async fn wrapper_with_blocks(store: &MockIpfsClient) -> CidWrapper {
        let mut cids = CidWrapper::new(42);
        cids.headers
            .push(store.put_block(Codec::EthBlock, b"header").await.unwrap());
        cids.transactions
            .push(store.put_block(Codec::EthTx, b"tx-0").await.unwrap());
        cids.transactions
            .push(store.put_block(Codec::EthTx, b"tx-1").await.unwrap());
        cids.state_nodes.push(StateNodeCid {
            state_key: B256::repeat_byte(1),
            cid: store.put_block(Codec::EthStateTrie, b"account").await.unwrap(),
            leaf: true,
        });
        cids.storage_nodes.push(StorageNodeWithStateKeyCid {
            state_key: B256::repeat_byte(1),
            storage_key: B256::repeat_byte(2),
            cid: store.put_block(Codec::EthStorageTrie, b"slot").await.unwrap(),
            leaf: true,
        });
        cids
    }

    #[tokio::test]
    async fn test_fetch_all_categories() {
        let store = Arc::new(MockIpfsClient::new());
        let cids = wrapper_with_blocks(&store).await;
        let fetcher = EthIpldFetcher::new(store);

        let blocks = fetcher.fetch(&cids).await.unwrap();

        assert_eq!(blocks.block_number, 42);
        assert_eq!(blocks.headers[0].data, Bytes::from_static(b"header"));
        assert_eq!(blocks.transactions.len(), 2);
        assert_eq!(blocks.transactions[1].data, Bytes::from_static(b"tx-1"));
        assert_eq!(
            blocks.state_nodes[&B256::repeat_byte(1)].data,
            Bytes::from_static(b"account")
        );
        assert_eq!(
            blocks.storage_nodes[&B256::repeat_byte(1)][&B256::repeat_byte(2)].data,
            Bytes::from_static(b"slot")
        );
    }

    #[tokio::test]
    async fn test_missing_blocks_are_skipped() {
        let store = Arc::new(MockIpfsClient::new());
        let cids = wrapper_with_blocks(&store).await;
        store.remove_block(&cids.transactions[0]);
        store.remove_block(&cids.state_nodes[0].cid);
        let fetcher = EthIpldFetcher::new(store);

        let blocks = fetcher.fetch(&cids).await.unwrap();

        assert_eq!(blocks.transactions.len(), 1);
        assert_eq!(blocks.transactions[0].cid, cids.transactions[1]);
        assert!(blocks.state_nodes.is_empty());
        assert_eq!(blocks.storage_nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_cid_is_an_error() {
        let fetcher = EthIpldFetcher::new(Arc::new(MockIpfsClient::new()));
        let mut cids = CidWrapper::new(1);
        cids.headers.push("not a cid".to_string());

        let result = fetcher.fetch(&cids).await;
        assert!(matches!(result, Err(QueryError::Fetcher(IpfsError::Cid(_)))));
    }
}
