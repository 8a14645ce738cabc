//! PostgreSQL implementation of the CID index.
//!
//! ## Key Features
//!
//! - Connection pooling with `sqlx::PgPool`
//! - One transaction per indexed block with automatic rollback
//! - Upserts with `ON CONFLICT DO UPDATE` on every natural key
//! - Filter-driven queries assembled with `QueryBuilder`
//!
//! ## Database Tables
//!
//! - `header_cids`: canonical headers (`final`) and uncles, keyed by `(block_number, block_hash)`
//! - `transaction_cids`: keyed by `(header_id, tx_hash)`, with `src`/`dst`
//! - `receipt_cids`: one per transaction, with `contract` and `topic0s`
//! - `state_cids`: keyed by `(header_id, state_key)`
//! - `storage_cids`: keyed by `(state_id, storage_key)`
mod cid_repository;
mod cid_retriever;

pub use cid_repository::PostgresCidRepository;
pub use cid_retriever::PostgresCidRetriever;

use crate::errors::RepositoryError;

/// Embedded schema migrations for the CID index.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("src/postgres/migrations");

/// Applies any pending schema migrations.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), RepositoryError> {
    MIGRATOR.run(pool).await?;
    Ok(())
}

pub(crate) fn to_db_block_number(block_number: u64) -> Result<i64, RepositoryError> {
    i64::try_from(block_number).map_err(|_| RepositoryError::InvalidBlockNumber(block_number))
}

pub(crate) fn from_db_block_number(block_number: i64) -> Result<u64, RepositoryError> {
    u64::try_from(block_number)
        .map_err(|_| RepositoryError::InvalidValue(format!("negative block number {}", block_number)))
}

pub(crate) fn to_db_tx_index(index: u32) -> Result<i32, RepositoryError> {
    i32::try_from(index)
        .map_err(|_| RepositoryError::InvalidValue(format!("transaction index {} out of range", index)))
}
