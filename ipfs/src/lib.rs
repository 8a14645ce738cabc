//! IPFS block store adapter for Ethereum IPLD objects.
//!
//! This crate provides:
//! - [`IpfsSource`] config enum for choosing between mock and live block stores
//! - [`IpfsBlockStore`] trait for abstracting raw block access
//! - [`IpfsClient`] production client that talks to the Kubo HTTP API
//! - [`MockIpfsClient`] in-memory store for tests and local development
//! - [`keccak256_cid`] for computing the CID of an object before or without publishing it
//!
//! ## Usage with IpfsSource (Recommended)
//!
//! ```ignore
//! use ipfs::{Codec, IpfsSource};
//!
//! // Development/testing: keep blocks in memory
//! let store = IpfsSource::mock().into_store();
//!
//! // Production: use a local Kubo node
//! let store = IpfsSource::live("http://127.0.0.1:5001").into_store();
//!
//! let cid = store.put_block(Codec::EthTx, &tx_rlp).await?;
//! let bytes = store.get_block(&cid).await?;
//! ```

mod codec;
mod mock;

pub use codec::{keccak256_cid, parse_cid, Codec, KECCAK_256};
pub use mock::MockIpfsClient;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client as ReqwestClient;
use serde::Deserialize;

/// Default per-request timeout against the Kubo API.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum IpfsError {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cid error: {0}")]
    Cid(String),
    #[error("ipfs api error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("timeout")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, IpfsError>;

/// Trait for writing and reading raw blocks in a content-addressed store.
///
/// This trait abstracts the IPFS node to enable dependency injection
/// and mocking for testing. Production code uses [`IpfsClient`], while
/// tests use [`MockIpfsClient`].
#[async_trait]
pub trait IpfsBlockStore: Send + Sync {
    /// Store `data` as a block tagged with `codec`, returning its CID string.
    async fn put_block(&self, codec: Codec, data: &[u8]) -> Result<String>;

    /// Fetch the raw bytes of the block with the given CID.
    async fn get_block(&self, cid: &str) -> Result<Vec<u8>>;
}

/// Production client for the Kubo HTTP RPC API.
///
/// # Example
///
/// ```ignore
/// use ipfs::IpfsClient;
///
/// let client = IpfsClient::new("http://127.0.0.1:5001");
/// let cid = client.put_block(Codec::EthBlock, &header_rlp).await?;
/// ```
pub struct IpfsClient {
    url: String,
    client: ReqwestClient,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct BlockPutResponse {
    #[serde(rename = "Key")]
    key: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(rename = "Message")]
    message: String,
}

impl IpfsClient {
    pub fn new(url: &str) -> Self {
        IpfsClient {
            url: url.trim_end_matches('/').to_string(),
            client: ReqwestClient::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn check(res: reqwest::Response) -> Result<reqwest::Response> {
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }
        let body = res.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorResponse>(&body)
            .map(|e| e.message)
            .unwrap_or(body);
        Err(IpfsError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

fn map_request_error(e: reqwest::Error) -> IpfsError {
    if e.is_timeout() {
        IpfsError::Timeout
    } else {
        IpfsError::Reqwest(e)
    }
}

#[async_trait]
impl IpfsBlockStore for IpfsClient {
    async fn put_block(&self, codec: Codec, data: &[u8]) -> Result<String> {
        let url = format!(
            "{}/api/v0/block/put?cid-codec={}&mhtype=keccak-256&pin=true",
            self.url,
            codec.name()
        );
        let form = Form::new().part("data", Part::bytes(data.to_vec()));
        let res = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_request_error)?;
        let res = Self::check(res).await?;
        let put: BlockPutResponse = res.json().await?;
        Ok(put.key)
    }

    async fn get_block(&self, cid: &str) -> Result<Vec<u8>> {
        let cid = parse_cid(cid)?;
        // offline so a missing block fails fast instead of searching the network
        let url = format!("{}/api/v0/block/get?arg={}&offline=true", self.url, cid);
        let res = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_request_error)?;
        let res = match Self::check(res).await {
            Err(IpfsError::Api { message, .. }) if message.contains("not found") => {
                return Err(IpfsError::NotFound(cid.to_string()));
            }
            other => other?,
        };
        let bytes = res.bytes().await?;
        Ok(bytes.to_vec())
    }
}

/// Configuration for the block store.
///
/// Use this to explicitly choose between the in-memory and live stores.
///
/// # Example
///
/// ```ignore
/// use ipfs::IpfsSource;
///
/// let store = IpfsSource::mock().into_store();
/// let store = IpfsSource::live("http://127.0.0.1:5001").into_store();
/// ```
#[derive(Debug, Clone)]
pub enum IpfsSource {
    /// Keep blocks in memory.
    Mock,

    /// Connect to a live Kubo node.
    Live {
        /// The Kubo RPC API base URL (e.g., "http://127.0.0.1:5001")
        api_url: String,
    },
}

impl IpfsSource {
    pub fn mock() -> Self {
        Self::Mock
    }

    pub fn live(api_url: impl Into<String>) -> Self {
        Self::Live {
            api_url: api_url.into(),
        }
    }

    /// Create the appropriate IpfsBlockStore implementation.
    ///
    /// Returns a shared trait object so the publisher and fetcher can use the
    /// same store.
    pub fn into_store(self) -> Arc<dyn IpfsBlockStore> {
        match self {
            IpfsSource::Mock => Arc::new(MockIpfsClient::new()),
            IpfsSource::Live { api_url } => Arc::new(IpfsClient::new(&api_url)),
        }
    }
}
