//! Storage Error Types
//!
//! ## Error Categories
//!
//! ### Data Integrity
//! - `InvalidMagic`: file doesn't start or end with the `TBAG` magic
//! - `CrcMismatch`: corruption detected via the footer checksum
//! - `Truncated` / `InvalidRecord`: malformed framing
//!
//! ### Compatibility
//! - `UnsupportedVersion`: file written by a newer format version
//!
//! ### Writer State
//! - `NotOpen` / `AlreadyOpen`: facade lifecycle misuse
//! - `UnknownTopic`: a record arrived for a topic that was never registered;
//!   such records are never written
//!
//! A failed write of a single record is logged and dropped by the facade;
//! it does not tear down the pipeline. Open failures are fatal to `open`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes")]
    InvalidMagic,

    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u16),

    #[error(transparent)]
    Core(#[from] topicbag_core::Error),

    #[error("CRC mismatch")]
    CrcMismatch,

    #[error("Truncated file: {0}")]
    Truncated(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Writer is not open")]
    NotOpen,

    #[error("Writer is already open")]
    AlreadyOpen,

    #[error("Topic not registered: {0}")]
    UnknownTopic(String),
}
