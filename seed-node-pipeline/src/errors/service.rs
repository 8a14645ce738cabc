//! Error types for the service and its background tasks.
use thiserror::Error;

use crate::errors::{DecodeError, IndexError, PublishError, QueryError, SubscriptionError};

/// Represents errors returned by the service entry points and task handles.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Invalid filter: {0}")]
    InvalidFilter(#[from] serde_json::Error),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Service already started")]
    AlreadyStarted,
}
