//! Error types for the upstream payload subscription.
use thiserror::Error;

use crate::errors::StreamError;

/// Represents a failure of the upstream subscription itself.
///
/// Unlike per-payload errors this is fatal to the ingest task and is
/// surfaced to whoever owns the service.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("Upstream subscription closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
}
