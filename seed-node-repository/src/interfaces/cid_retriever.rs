use seed_node_shared::types::{CidWrapper, FilterConfig, Gap};

use crate::errors::RepositoryError;

/// A trait that defines the read side of the CID index.
#[async_trait::async_trait]
pub trait CidRetriever: Send + Sync {
    /// Returns the CIDs at `block_number` that match `filter`.
    ///
    /// Each category honours its on/off flag and allow-lists, matching
    /// exactly what the live filterer would select from the same block.
    /// Blocks outside the filter's range yield an empty wrapper.
    async fn retrieve_cids(
        &self,
        filter: &FilterConfig,
        block_number: u64,
    ) -> Result<CidWrapper, RepositoryError>;

    /// Lowest indexed block number, or `None` when the index is empty.
    async fn retrieve_first_block_number(&self) -> Result<Option<u64>, RepositoryError>;

    /// Highest indexed block number, or `None` when the index is empty.
    async fn retrieve_last_block_number(&self) -> Result<Option<u64>, RepositoryError>;

    /// Ranges between the first and last indexed blocks that have no header.
    async fn retrieve_gaps_in_data(&self) -> Result<Vec<Gap>, RepositoryError>;
}
