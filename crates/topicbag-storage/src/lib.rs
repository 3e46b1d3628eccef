//! topicbag Storage Layer
//!
//! This crate implements the on-disk side of the capture-and-replay
//! pipeline: a self-describing binary container for recorded bus traffic,
//! plus the writer and reader facades the recorder and player talk to.
//!
//! ## Main Components
//!
//! ### Container format (`bag` module)
//! A single-writer log file holding schema records (embedded descriptor
//! sets), channel records (topic ↔ schema bindings), and compressed chunks
//! of message records, framed and checksummed. Each file is independently
//! readable: everything needed to interpret the payloads travels with them.
//!
//! ### LogWriter
//! Opens and rotates container files, registers schemas and channels,
//! writes message batches best-effort, and tracks an estimated file size to
//! drive size-based rotation. On rotation, every known schema and channel is
//! re-registered into the new file from in-memory caches.
//!
//! ### LogReader
//! Opens a container file, validates it, exposes the schema/channel tables,
//! and streams messages lazily, decompressing one chunk at a time.
//!
//! ## Write Flow
//!
//! ```text
//! register_topic(info, descriptor_set)
//!     ↓
//! Schema + Channel records         ← written outside chunks
//!     ↓
//! write_batch(messages)
//!     ↓
//! chunk buffer (~chunk_size)       ← message frames accumulate
//!     ↓ full
//! compress (None | Lz4 | Zstd)
//!     ↓
//! Chunk record → file
//!     ↓ size estimate ≥ max_file_size
//! rotate: finish file, open next, re-register schemas/channels
//! ```

pub mod bag;
pub mod config;
pub mod error;
pub mod reader;
pub mod writer;

pub use bag::{BagWriterOptions, ChannelInfo, LogMessage, SchemaInfo};
pub use config::StorageConfig;
pub use error::{Error, Result};
pub use reader::LogReader;
pub use writer::{FileInfo, LogWriter};
