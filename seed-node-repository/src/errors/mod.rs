//! Error types for the seed node repository.
//! Consolidates and re-exports error types related to CID index operations.
mod repository;

pub use repository::RepositoryError;
