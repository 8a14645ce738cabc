//! # Seed Node Pipeline
//! This crate turns the upstream stream of per-block state diffs into
//! content-addressed objects, a CID index and filtered client feeds.
//!
//! Raw payloads flow through the [`converter`], then fan out to the index
//! workers ([`publisher`] then the CID repository) and to the live serve
//! loop ([`filterer`]). Historical data is served from the index through the
//! [`fetcher`] and [`resolver`], and [`backfill`] repairs gaps in the index.
pub mod api;
pub mod backfill;
pub mod converter;
pub mod errors;
pub mod fetcher;
pub mod filterer;
pub mod publisher;
pub mod resolver;
pub mod service;
pub mod streamer;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::{PayloadSubscription, SeedNodeApi};
pub use backfill::{BackFillConfig, BackFillService};
pub use service::{Service, ServiceConfig, ServiceDependencies};
