//! In-memory payload sources for tests and local development.
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use seed_node_shared::types::RawPayload;
use tokio::sync::mpsc;

use crate::errors::{StreamError, SubscriptionError};
use crate::streamer::{PayloadFetcher, PayloadStreamer};

/// Streamer fed by hand through the sender returned from [`MockPayloadStreamer::channel`].
pub struct MockPayloadStreamer {
    receiver: Mutex<Option<mpsc::Receiver<Result<RawPayload, SubscriptionError>>>>,
}

impl MockPayloadStreamer {
    pub fn channel(
        buffer_size: usize,
    ) -> (mpsc::Sender<Result<RawPayload, SubscriptionError>>, Self) {
        let (tx, rx) = mpsc::channel(buffer_size.max(1));
        (
            tx,
            Self {
                receiver: Mutex::new(Some(rx)),
            },
        )
    }
}

impl PayloadStreamer for MockPayloadStreamer {
    /// Hands out the receiver once; later calls get a stream that is already closed.
    fn stream(&self) -> mpsc::Receiver<Result<RawPayload, SubscriptionError>> {
        self.receiver
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .unwrap_or_else(|| mpsc::channel(1).1)
    }
}

/// Fetcher serving payloads from a map and recording what was asked for.
#[derive(Default)]
pub struct MockPayloadFetcher {
    payloads: HashMap<u64, RawPayload>,
    requested: Mutex<Vec<u64>>,
    unreachable: bool,
}

impl MockPayloadFetcher {
    pub fn new(payloads: impl IntoIterator<Item = RawPayload>) -> Self {
        Self {
            payloads: payloads.into_iter().map(|p| (p.block_number, p)).collect(),
            ..Default::default()
        }
    }

    /// A fetcher whose node cannot be reached.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Default::default()
        }
    }

    /// Every block number requested so far, in request order.
    pub fn requested(&self) -> Vec<u64> {
        self.requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl PayloadFetcher for MockPayloadFetcher {
    async fn fetch_payloads_at(&self, block_numbers: &[u64]) -> Result<Vec<RawPayload>, StreamError> {
        self.requested
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(block_numbers);
        if self.unreachable {
            return Err(StreamError::InvalidResponse("mock node unreachable".to_string()));
        }
        Ok(block_numbers
            .iter()
            .map(|n| {
                self.payloads
                    .get(n)
                    .cloned()
                    .unwrap_or_else(|| RawPayload::failed(*n, "block not available"))
            })
            .collect())
    }
}
