//! Schema Error Types
//!
//! Failures here are fatal to topic registration: a recorder that cannot
//! resolve a configured type unwinds its startup rather than recording
//! payloads it cannot describe.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchemaError>;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema source not found on any search path: {0}")]
    FileNotFound(String),

    #[error("Type not resolvable: {0}")]
    TypeNotFound(String),

    #[error("Descriptor for {file} requires missing dependency {dependency}")]
    MissingDependency { file: String, dependency: String },

    #[error("Descriptor decode error in {file}: {source}")]
    Decode {
        file: String,
        #[source]
        source: prost::DecodeError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
