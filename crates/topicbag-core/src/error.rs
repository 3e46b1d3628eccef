//! Error Types for the topicbag Core
//!
//! Small, shared error surface for the core crate. The buffer itself reports
//! refusals through boolean returns (a full or stopped buffer is an expected
//! condition, not an error); this enum covers the genuinely invalid cases
//! such as unknown compression identifiers read back from a file header.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid compression type: {0}")]
    InvalidCompression(u16),

    #[error("Unknown compression name: {0}")]
    UnknownCompressionName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
