//! Top-Level Error Type
//!
//! Start-up failures surface through here (and are reported as boolean
//! results by the lifecycle methods, matching the contract that a failed
//! `start` fully unwinds). Single-record failures never reach this type;
//! they are logged and counted where they happen.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Schema(#[from] topicbag_schema::SchemaError),

    #[error(transparent)]
    Storage(#[from] topicbag_storage::Error),

    #[error(transparent)]
    Transport(#[from] topicbag_transport::TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
