//! # Seed Node Repository
//! This crate provides the CID index: traits for writing published CIDs with
//! their relational metadata and for retrieving the CIDs that match a
//! subscription filter, a PostgreSQL implementation and an in-memory one.
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod postgres;
mod source;

pub use errors::RepositoryError;
pub use interfaces::{CidRepository, CidRetriever};
pub use memory::InMemoryCidIndex;
pub use postgres::{PostgresCidRepository, PostgresCidRetriever};
pub use source::{CidIndex, CidIndexSource};
