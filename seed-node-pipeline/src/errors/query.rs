//! Error types for reading historical data during backfill.
use ipfs::IpfsError;
use seed_node_repository::RepositoryError;
use thiserror::Error;

/// Represents errors that can occur while serving a backfill.
///
/// These are reported in-band to the one subscriber that asked for the
/// backfill and never affect the live pipeline.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Retriever error: {0}")]
    Retriever(#[from] RepositoryError),

    #[error("Fetcher error: {0}")]
    Fetcher(#[from] IpfsError),

    #[error("No indexed data")]
    NoIndexedData,
}
