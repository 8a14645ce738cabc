//! Error types for the publisher.
use alloy_primitives::B256;
use ipfs::IpfsError;
use thiserror::Error;

/// Represents errors that can occur while publishing a converted payload.
///
/// A partial publish is reported like any other failure; the caller must
/// not index the block.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Block store error: {0}")]
    Store(#[from] IpfsError),

    #[error("Expected {expected} {kind} CIDs, got {actual}")]
    CountMismatch {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Storage nodes under {0} have no state node")]
    OrphanStorage(B256),
}
