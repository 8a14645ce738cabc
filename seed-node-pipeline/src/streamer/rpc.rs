//! JSON-RPC access to a node that serves the statediff API.
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::Bytes;
use async_trait::async_trait;
use seed_node_shared::types::RawPayload;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::{StreamError, SubscriptionError};
use crate::streamer::{PayloadFetcher, PayloadStreamer};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Head poll failures in a row after which the upstream subscription is
/// considered lost.
const MAX_CONSECUTIVE_HEAD_FAILURES: u32 = 5;

pub struct RpcClient {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateDiffResponse {
    block_rlp: Bytes,
    #[serde(default)]
    receipts_rlp: Bytes,
    #[serde(default, alias = "stateObjectRlp")]
    state_diff_rlp: Bytes,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

fn parse_hex_u64(value: &str) -> Result<u64, StreamError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16)
        .map_err(|e| StreamError::InvalidResponse(format!("{value} is not a hex quantity: {e}")))
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self, StreamError> {
        Self::with_timeout(url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, StreamError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, StreamError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let response = self.client.post(&self.url).json(&request).send().await?;
        let status = response.status();
        let mut value: Value = response.json().await?;

        if let Some(error) = value.get("error") {
            let error: RpcErrorObject = serde_json::from_value(error.clone())
                .map_err(|e| StreamError::InvalidResponse(format!("{method} error object: {e}")))?;
            return Err(StreamError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        if !status.is_success() {
            return Err(StreamError::InvalidResponse(format!(
                "{method} returned HTTP {status}"
            )));
        }

        value
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| StreamError::InvalidResponse(format!("{method} missing result field")))
    }

    /// Current head of the chain.
    pub async fn block_number(&self) -> Result<u64, StreamError> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        let value = result.as_str().ok_or_else(|| {
            StreamError::InvalidResponse(format!("eth_blockNumber returned non-string: {result}"))
        })?;
        parse_hex_u64(value)
    }

    /// Block, receipts and state diff at `block_number`.
    pub async fn state_diff_at(&self, block_number: u64) -> Result<RawPayload, StreamError> {
        let params = json!([
            block_number,
            {
                "includeBlock": true,
                "includeReceipts": true,
                "intermediateStateNodes": true,
                "intermediateStorageNodes": true,
            }
        ]);
        let result = self.call("statediff_stateDiffAt", params).await?;
        let response: StateDiffResponse = serde_json::from_value(result).map_err(|e| {
            StreamError::InvalidResponse(format!("statediff_stateDiffAt result: {e}"))
        })?;
        Ok(RawPayload {
            block_number,
            block_rlp: response.block_rlp,
            receipts_rlp: response.receipts_rlp,
            state_diff_rlp: response.state_diff_rlp,
            err: None,
        })
    }

    /// Fetches one block, turning a failed call into a payload that carries
    /// the error.
    async fn payload_at(&self, block_number: u64) -> RawPayload {
        match self.state_diff_at(block_number).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(block = block_number, error = %e, "Failed to fetch state diff");
                RawPayload::failed(block_number, e.to_string())
            }
        }
    }
}

/// Streams one payload per new head by polling the node.
pub struct RpcPayloadStreamer {
    client: Arc<RpcClient>,
    poll_interval: Duration,
    buffer_size: usize,
}

impl RpcPayloadStreamer {
    pub fn new(client: Arc<RpcClient>, poll_interval: Duration, buffer_size: usize) -> Self {
        Self {
            client,
            poll_interval,
            buffer_size,
        }
    }
}

impl PayloadStreamer for RpcPayloadStreamer {
    fn stream(&self) -> mpsc::Receiver<Result<RawPayload, SubscriptionError>> {
        let (tx, rx) = mpsc::channel(self.buffer_size.max(1));
        let client = self.client.clone();
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tokio::spawn(async move {
            let mut next_block: Option<u64> = None;
            let mut failures = 0;
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    _ = interval.tick() => {}
                }

                let head = match client.block_number().await {
                    Ok(head) => {
                        failures = 0;
                        head
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(error = %e, failures, "Failed to poll chain head");
                        if failures >= MAX_CONSECUTIVE_HEAD_FAILURES {
                            let _ = tx.send(Err(SubscriptionError::Stream(e))).await;
                            break;
                        }
                        continue;
                    }
                };

                // start from the head seen at subscription time
                let from = *next_block.get_or_insert(head);
                if head < from {
                    continue;
                }
                debug!(from, head, "Streaming new blocks");
                for block_number in from..=head {
                    if tx.send(Ok(client.payload_at(block_number).await)).await.is_err() {
                        info!("Payload receiver dropped, stopping head poll");
                        return;
                    }
                }
                next_block = Some(head + 1);
            }
        });

        rx
    }
}

/// Fetches historical payloads out of band, typically from an archive node.
pub struct RpcPayloadFetcher {
    client: Arc<RpcClient>,
}

impl RpcPayloadFetcher {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PayloadFetcher for RpcPayloadFetcher {
    async fn fetch_payloads_at(&self, block_numbers: &[u64]) -> Result<Vec<RawPayload>, StreamError> {
        let mut payloads = Vec::with_capacity(block_numbers.len());
        for &block_number in block_numbers {
            match self.client.state_diff_at(block_number).await {
                Ok(payload) => payloads.push(payload),
                // the node answered, it just has nothing for this block
                Err(e @ (StreamError::Rpc { .. } | StreamError::InvalidResponse(_))) => {
                    payloads.push(RawPayload::failed(block_number, e.to_string()))
                }
                Err(e) => return Err(e),
            }
        }
        Ok(payloads)
    }
}
