use alloy_primitives::Bytes;

/// One per-block update as delivered by the upstream node subscription.
///
/// The three RLP blobs are opaque until the converter decodes them. When the
/// upstream failed to produce data for this block, `err` carries its message
/// and the blobs are empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawPayload {
    pub block_number: u64,
    pub block_rlp: Bytes,
    pub receipts_rlp: Bytes,
    pub state_diff_rlp: Bytes,
    pub err: Option<String>,
}

impl RawPayload {
    /// Builds a payload that carries only an upstream error for `block_number`.
    pub fn failed(block_number: u64, err: impl Into<String>) -> Self {
        Self {
            block_number,
            err: Some(err.into()),
            ..Default::default()
        }
    }
}
