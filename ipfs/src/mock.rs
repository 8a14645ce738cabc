//! In-memory block store for testing and local development.
//!
//! The `MockIpfsClient` computes the same CIDs a Kubo node would for a block
//! put with `mhtype=keccak-256`, so CIDs produced against the mock are valid
//! against a live node too.
//!
//! # Example
//!
//! ```ignore
//! use ipfs::{Codec, IpfsBlockStore, MockIpfsClient};
//!
//! let client = MockIpfsClient::new();
//! let cid = client.put_block(Codec::EthBlock, &header_rlp).await?;
//! assert!(client.has_cid(&cid));
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::codec::{keccak256_cid, parse_cid};
use crate::{Codec, IpfsBlockStore, IpfsError, Result};

/// Mock block store that keeps raw blocks in a map.
pub struct MockIpfsClient {
    /// Map of CID -> raw block bytes
    blocks: RwLock<HashMap<String, Vec<u8>>>,
    /// When set, every put fails as if the node were unreachable
    reject_writes: AtomicBool,
}

impl MockIpfsClient {
    /// Create a new empty mock store.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
            reject_writes: AtomicBool::new(false),
        }
    }

    /// Make subsequent puts fail (or succeed again).
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Drop a block so later reads miss it.
    pub fn remove_block(&self, cid: &str) -> Option<Vec<u8>> {
        let cid = normalize_cid(cid);
        self.blocks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&cid)
    }

    /// Check if a CID is stored in the mock.
    pub fn has_cid(&self, cid: &str) -> bool {
        let cid = normalize_cid(cid);
        self.blocks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&cid)
    }

    /// Get the number of stored blocks.
    pub fn len(&self) -> usize {
        self.blocks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if the mock is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}

impl Default for MockIpfsClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IpfsBlockStore for MockIpfsClient {
    async fn put_block(&self, codec: Codec, data: &[u8]) -> Result<String> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(IpfsError::Api {
                status: 503,
                message: "mock store is rejecting writes".to_string(),
            });
        }
        let cid = keccak256_cid(codec, data)?;
        self.blocks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(cid.clone(), data.to_vec());
        Ok(cid)
    }

    async fn get_block(&self, cid: &str) -> Result<Vec<u8>> {
        let cid = parse_cid(cid)?.to_string();
        self.blocks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&cid)
            .cloned()
            .ok_or_else(|| IpfsError::NotFound(format!("CID not found in mock: {}", cid)))
    }
}

/// Normalize a CID by removing the `ipfs://` prefix if present.
fn normalize_cid(cid: &str) -> String {
    cid.strip_prefix("ipfs://").unwrap_or(cid).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_and_get_block() {
        let client = MockIpfsClient::new();
        let cid = client.put_block(Codec::EthBlock, b"header").await.unwrap();

        assert!(client.has_cid(&cid));
        assert_eq!(client.len(), 1);
        assert_eq!(client.get_block(&cid).await.unwrap(), b"header".to_vec());
    }

    #[tokio::test]
    async fn test_put_is_idempotent() {
        let client = MockIpfsClient::new();
        let first = client.put_block(Codec::EthTx, b"tx").await.unwrap();
        let second = client.put_block(Codec::EthTx, b"tx").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_block() {
        let client = MockIpfsClient::new();
        let cid = keccak256_cid(Codec::EthTx, b"never stored").unwrap();

        let result = client.get_block(&cid).await;
        assert!(matches!(result, Err(IpfsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_with_ipfs_prefix() {
        let client = MockIpfsClient::new();
        let cid = client.put_block(Codec::EthStateTrie, b"node").await.unwrap();

        let bytes = client.get_block(&format!("ipfs://{}", cid)).await.unwrap();
        assert_eq!(bytes, b"node".to_vec());
    }

    #[tokio::test]
    async fn test_reject_writes() {
        let client = MockIpfsClient::new();
        client.reject_writes(true);

        let result = client.put_block(Codec::EthTx, b"tx").await;
        assert!(matches!(result, Err(IpfsError::Api { status: 503, .. })));
        assert!(client.is_empty());

        client.reject_writes(false);
        assert!(client.put_block(Codec::EthTx, b"tx").await.is_ok());
    }

    #[tokio::test]
    async fn test_remove_block() {
        let client = MockIpfsClient::default();
        let cid = client.put_block(Codec::EthTxReceipt, b"rct").await.unwrap();

        assert_eq!(client.remove_block(&cid), Some(b"rct".to_vec()));
        assert!(!client.has_cid(&cid));
    }
}
