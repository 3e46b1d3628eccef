//! Storage Configuration
//!
//! Controls how log files are compressed, chunked, batched, and rotated.
//!
//! - **compression_type / compression_level**: chunk compression
//! - **proto_search_paths**: directories searched for schema source files
//! - **write_batch_size**: records drained from the buffer per write pass
//! - **max_file_size / split_by_size**: size-based rotation threshold
//! - **chunk_size**: target uncompressed chunk size in bytes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use topicbag_core::Compression;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Chunk compression (default: none)
    #[serde(default = "default_compression")]
    pub compression_type: Compression,

    /// Compression level, meaningful for zstd (default: 0)
    #[serde(default)]
    pub compression_level: i32,

    /// Directories searched for schema source files
    #[serde(default)]
    pub proto_search_paths: Vec<PathBuf>,

    /// Records drained from the buffer per write pass (default: 1000)
    #[serde(default = "default_write_batch_size")]
    pub write_batch_size: usize,

    /// Rotation threshold in bytes (default: 1 GiB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Target uncompressed chunk size in bytes (default: 1 MiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Whether to rotate files once `max_file_size` is reached (default: true)
    #[serde(default = "default_split_by_size")]
    pub split_by_size: bool,
}

fn default_compression() -> Compression {
    Compression::None
}

fn default_write_batch_size() -> usize {
    1000
}

fn default_max_file_size() -> u64 {
    1024 * 1024 * 1024
}

fn default_chunk_size() -> u64 {
    1024 * 1024
}

fn default_split_by_size() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            compression_type: default_compression(),
            compression_level: 0,
            proto_search_paths: Vec::new(),
            write_batch_size: default_write_batch_size(),
            max_file_size: default_max_file_size(),
            chunk_size: default_chunk_size(),
            split_by_size: default_split_by_size(),
        }
    }
}
