//! Configuration module for the seed node.
//! Reads settings from the environment and wires up the pipeline components.
mod dependencies;
mod settings;

pub use dependencies::Dependencies;
pub use settings::{Config, MOCK_BACKEND};
