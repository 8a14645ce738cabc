//! Streamer module for the seed node pipeline.
//!
//! Defines the boundary to the upstream chain-data client: a push-style
//! stream of raw payloads for new blocks, and an out-of-band fetcher for
//! historical blocks used to repair gaps in the index.
mod mock;
mod rpc;

pub use mock::{MockPayloadFetcher, MockPayloadStreamer};
pub use rpc::{RpcClient, RpcPayloadFetcher, RpcPayloadStreamer};

use async_trait::async_trait;
use seed_node_shared::types::RawPayload;
use tokio::sync::mpsc;

use crate::errors::{StreamError, SubscriptionError};

/// Trait for subscribing to raw payloads as new blocks arrive.
pub trait PayloadStreamer: Send + Sync {
    /// Opens the subscription.
    ///
    /// A payload that carries an error is a single-block failure. An `Err`
    /// item means the subscription itself failed, and the stream ends after it.
    /// Dropping the receiver ends the subscription.
    fn stream(&self) -> mpsc::Receiver<Result<RawPayload, SubscriptionError>>;
}

/// Trait for fetching raw payloads of past blocks on demand.
#[async_trait]
pub trait PayloadFetcher: Send + Sync {
    /// Returns one payload per requested block number, in request order.
    ///
    /// Blocks the node has no data for come back as payloads carrying an
    /// error; an `Err` means the node could not be asked at all.
    async fn fetch_payloads_at(&self, block_numbers: &[u64]) -> Result<Vec<RawPayload>, StreamError>;
}
