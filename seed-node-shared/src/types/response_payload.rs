use std::collections::BTreeMap;

use alloy_primitives::{B256, Bytes};
use serde::{Deserialize, Serialize};

/// The message streamed to subscribers, live or backfilled.
///
/// Both paths produce this exact shape, so a client cannot tell them apart.
/// When something went wrong serving this subscriber, `err_msg` is set and
/// the data fields are empty.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePayload {
    pub block_number: u64,
    #[serde(default)]
    pub headers: Vec<Bytes>,
    #[serde(default)]
    pub uncles: Vec<Bytes>,
    #[serde(default)]
    pub transactions: Vec<Bytes>,
    #[serde(default)]
    pub receipts: Vec<Bytes>,
    #[serde(default)]
    pub state_nodes: BTreeMap<B256, Bytes>,
    #[serde(default)]
    pub storage_nodes: BTreeMap<B256, BTreeMap<B256, Bytes>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_msg: Option<String>,
}

impl ResponsePayload {
    pub fn new(block_number: u64) -> Self {
        Self {
            block_number,
            ..Default::default()
        }
    }

    /// Builds an in-band error message for a subscriber.
    pub fn error(block_number: u64, err: impl Into<String>) -> Self {
        Self {
            block_number,
            err_msg: Some(err.into()),
            ..Default::default()
        }
    }

    /// True when the payload carries neither data nor an error.
    pub fn is_empty(&self) -> bool {
        self.err_msg.is_none()
            && self.headers.is_empty()
            && self.uncles.is_empty()
            && self.transactions.is_empty()
            && self.receipts.is_empty()
            && self.state_nodes.is_empty()
            && self.storage_nodes.is_empty()
    }
}
