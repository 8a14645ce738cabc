//! Error types for the converter.
//! Defines what can go wrong turning a raw upstream payload into structured data.
use alloy_primitives::{B256, SignatureError};
use thiserror::Error;

/// Represents errors that can occur while converting a raw payload.
///
/// A decode error rejects the whole payload; the ingest loop logs it and
/// moves on to the next block.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("RLP decode error: {0}")]
    Rlp(#[from] alloy_rlp::Error),

    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    #[error("Expected a list: {0}")]
    ExpectedList(&'static str),

    #[error("Block has {0} parts, expected header, transactions and uncles")]
    MalformedBlock(usize),

    #[error("Header has {0} fields")]
    ShortHeader(usize),

    #[error("Invalid signature v value: {0}")]
    InvalidV(u64),

    #[error("Invalid trie key length: {0}")]
    InvalidKey(usize),

    #[error("Unsupported transaction type: {0:#x}")]
    UnsupportedTransaction(u8),

    #[error("Expected {expected} receipts, got {actual}")]
    MismatchedReceipts { expected: usize, actual: usize },

    #[error("Receipt {index} is for transaction {actual}, expected {expected}")]
    ReceiptTxHash {
        index: usize,
        expected: B256,
        actual: B256,
    },

    #[error("Upstream error at block {block_number}: {message}")]
    Upstream { block_number: u64, message: String },
}
