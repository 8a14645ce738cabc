//! Error types for the seed node binary.
//! Wraps the failures of configuration, the CID index and the pipeline so the
//! entry point can report them uniformly.
use seed_node_pipeline::errors::{ServiceError, StreamError};
use seed_node_repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SeedNodeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
    #[error("Upstream client error: {0}")]
    Stream(#[from] StreamError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
