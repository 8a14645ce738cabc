//! Error types for writing to the CID index.
use seed_node_repository::RepositoryError;
use thiserror::Error;

/// Represents a failed write to the CID index.
///
/// The transaction has been rolled back; re-indexing the same block later
/// is safe because every write is an upsert.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}
