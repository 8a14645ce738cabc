//! Error types for the CID index.
//! Defines specific errors that can occur while writing or querying CIDs.
use thiserror::Error;

/// Represents errors that can occur within the CID repository and retriever.
///
/// Write failures surface to the pipeline as index errors, read failures as
/// query errors; in both cases any open transaction has been rolled back.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("Block number out of range: {0}")]
    InvalidBlockNumber(u64),

    #[error("Invalid value in index: {0}")]
    InvalidValue(String),

    #[error("Index rejected write: {0}")]
    Rejected(String),
}
