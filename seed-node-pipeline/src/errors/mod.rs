//! Error types for the seed node pipeline.
//! Each stage owns its error type; per-payload errors are logged and skipped,
//! only subscription errors end the ingest task.
mod decode;
mod publish;
mod index;
mod query;
mod subscription;
mod stream;
mod service;

pub use decode::DecodeError;
pub use publish::PublishError;
pub use index::IndexError;
pub use query::QueryError;
pub use subscription::SubscriptionError;
pub use stream::StreamError;
pub use service::ServiceError;
