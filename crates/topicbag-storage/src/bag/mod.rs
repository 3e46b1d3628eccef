//! Bag Container Format
//!
//! This module implements the binary file format for recorded bus traffic.
//! The format is modeled on MCAP semantics: schema records carry embedded
//! descriptor sets, channel records bind topics to schemas, and message
//! records reference channels. Every file is self-describing.
//!
//! ## File Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (32 bytes)                                           │
//! │ - Magic bytes: "TBAG" (4 bytes)                             │
//! │ - Version: 1 (2 bytes)                                      │
//! │ - Compression: None/Lz4/Zstd (2 bytes)                      │
//! │ - Chunk size (8 bytes)                                      │
//! │ - Reserved (16 bytes)                                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Framed records: opcode (1 byte) + length (4 bytes) + body   │
//! │                                                             │
//! │ Schema (0x01):                                              │
//! │   id u16, name str, encoding str, data (u32 len + bytes)    │
//! │ Channel (0x02):                                             │
//! │   id u16, schema_id u16, topic str, message_encoding str,   │
//! │   metadata count u16 + (key str, value str) pairs           │
//! │ Chunk (0x03):                                               │
//! │   uncompressed size u64, compressed run of message frames   │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Footer (32 bytes)                                           │
//! │ - Message count (8 bytes)                                   │
//! │ - Chunk count (4 bytes)                                     │
//! │ - CRC32 of everything before the footer (4 bytes)           │
//! │ - Magic bytes: "TBAG" again (4 bytes)                       │
//! │ - Reserved (12 bytes)                                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Strings are u16 length + UTF-8 bytes. All integers are big-endian.
//!
//! ## Message Frame (inside a chunk, after decompression)
//!
//! ```text
//! channel_id u16, sequence u64, log_time u64, publish_time u64,
//! data length u32, data bytes
//! ```
//!
//! ## Why This Design?
//!
//! ### Schemas and channels outside chunks
//! A reader can build the full channel table from a cheap top-level scan
//! without decompressing anything; registration always precedes the first
//! message of a channel, so a sequential reader is never surprised.
//!
//! ### Chunked compression
//! Messages are buffered to ~chunk_size and compressed as a unit. Chunks
//! decompress independently, so a streaming reader holds at most one
//! uncompressed chunk in memory.
//!
//! ### CRC32 footer
//! Detects truncation and bit rot across the whole file. The checksum
//! covers everything before the footer.

pub mod reader;
pub mod writer;

pub use reader::{BagReader, ChannelInfo, LogMessage, MessageIter, SchemaInfo};
pub use writer::{BagWriter, BagWriterOptions};

/// Magic bytes at the start and in the footer of every bag file.
pub const BAG_MAGIC: [u8; 4] = *b"TBAG";

/// Current format version.
pub const BAG_VERSION: u16 = 1;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 32;

/// Fixed footer size in bytes.
pub const FOOTER_SIZE: usize = 32;

/// Record opcodes.
pub const OP_SCHEMA: u8 = 0x01;
pub const OP_CHANNEL: u8 = 0x02;
pub const OP_CHUNK: u8 = 0x03;

/// Fixed per-message frame overhead: channel_id + sequence + log_time +
/// publish_time + data length prefix.
pub const MESSAGE_FRAME_OVERHEAD: u64 = 2 + 8 + 8 + 8 + 4;
