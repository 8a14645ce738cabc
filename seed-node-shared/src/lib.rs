//! # Seed Node Shared
//! This crate defines the data structures passed between the stages of the seed node:
//! raw upstream payloads, converted payloads, CID sets produced by publishing and
//! retrieval, raw IPLD block sets, client responses and the subscription filter.
pub mod keys;
pub mod types;
