//! This module defines and re-exports the interfaces for the CID index.
mod cid_repository;
mod cid_retriever;

pub use cid_repository::CidRepository;
pub use cid_retriever::CidRetriever;
