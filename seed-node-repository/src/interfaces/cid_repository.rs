use seed_node_shared::types::CidPayload;

use crate::errors::RepositoryError;

/// A trait that defines the write side of the CID index.
///
/// Implementors persist every CID of a published block together with its
/// relational metadata.
#[async_trait::async_trait]
pub trait CidRepository: Send + Sync {
    /// Indexes all CIDs of one block atomically.
    ///
    /// The header row is written first, then uncles, then each transaction
    /// followed by its receipt, then each state node followed by its storage
    /// nodes. Every write is an upsert on the row's natural key, so indexing
    /// the same payload again overwrites rather than duplicates. On any
    /// failure nothing from this payload is left behind.
    ///
    /// # Arguments
    ///
    /// * `payload` - The CIDs produced by publishing one block.
    ///
    /// # Returns
    ///
    /// A `Result` indicating success or a `RepositoryError` if the write was rolled back.
    async fn index(&self, payload: &CidPayload) -> Result<(), RepositoryError>;
}
