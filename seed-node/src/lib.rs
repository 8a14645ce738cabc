//! Seed Node Library
//!
//! Configuration, dependency wiring and the websocket subscription server for
//! the seed node binary.

pub mod config;
pub mod errors;
pub mod server;

pub use config::{Config, Dependencies};
pub use errors::{ConfigError, SeedNodeError};
