//! Bag Writer - Building Self-Describing Log Files
//!
//! `BagWriter` streams framed records to any `Write` sink while maintaining
//! a running CRC32 and an accumulating chunk buffer for message frames.
//!
//! Invariants upheld here:
//! - Schema and channel records are never placed inside a chunk; writing one
//!   while a chunk is accumulating flushes the chunk first.
//! - `finish` flushes the partial chunk, writes the footer, and flushes the
//!   sink; a writer dropped without `finish` leaves a file the reader will
//!   reject (no valid footer), which is the honest signal for a torn write.
//!
//! The writer is not thread-safe; the owning facade serializes access.

use crate::bag::{
    BAG_MAGIC, BAG_VERSION, FOOTER_SIZE, HEADER_SIZE, OP_CHANNEL, OP_CHUNK, OP_SCHEMA,
};
use crate::error::{Error, Result};
use bytes::{BufMut, BytesMut};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use topicbag_core::Compression;
use tracing::trace;

/// Options carried by every bag file.
#[derive(Debug, Clone)]
pub struct BagWriterOptions {
    pub compression: Compression,
    /// Compression level; meaningful for zstd
    pub compression_level: i32,
    /// Target uncompressed chunk size in bytes
    pub chunk_size: u64,
}

impl Default for BagWriterOptions {
    fn default() -> Self {
        Self {
            compression: Compression::None,
            compression_level: 0,
            chunk_size: 1024 * 1024,
        }
    }
}

/// Streams a bag file to a `Write` sink.
pub struct BagWriter<W: Write> {
    sink: W,
    options: BagWriterOptions,
    crc: crc32fast::Hasher,
    bytes_written: u64,
    /// Uncompressed message frames accumulating toward the next chunk
    chunk: BytesMut,
    chunk_messages: u64,
    message_count: u64,
    chunk_count: u32,
}

impl BagWriter<BufWriter<File>> {
    /// Create a bag file at `path`.
    pub fn create(path: &Path, options: BagWriterOptions) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), options)
    }
}

impl<W: Write> BagWriter<W> {
    /// Wrap a sink and write the file header.
    pub fn new(sink: W, options: BagWriterOptions) -> Result<Self> {
        let mut writer = Self {
            sink,
            options,
            crc: crc32fast::Hasher::new(),
            bytes_written: 0,
            chunk: BytesMut::new(),
            chunk_messages: 0,
            message_count: 0,
            chunk_count: 0,
        };

        let mut header = BytesMut::with_capacity(HEADER_SIZE);
        header.put_slice(&BAG_MAGIC);
        header.put_u16(BAG_VERSION);
        header.put_u16(writer.options.compression as u16);
        header.put_u64(writer.options.chunk_size);
        header.put_bytes(0, 16);
        writer.emit(&header)?;

        Ok(writer)
    }

    /// Register a schema record. Flushes any accumulating chunk first.
    pub fn add_schema(&mut self, id: u16, name: &str, encoding: &str, data: &[u8]) -> Result<()> {
        self.flush_chunk()?;

        let mut body = BytesMut::new();
        body.put_u16(id);
        put_str(&mut body, name);
        put_str(&mut body, encoding);
        body.put_u32(data.len() as u32);
        body.put_slice(data);

        self.emit_record(OP_SCHEMA, &body)
    }

    /// Register a channel record binding a topic to a schema.
    pub fn add_channel(
        &mut self,
        id: u16,
        schema_id: u16,
        topic: &str,
        message_encoding: &str,
        metadata: &[(String, String)],
    ) -> Result<()> {
        self.flush_chunk()?;

        let mut body = BytesMut::new();
        body.put_u16(id);
        body.put_u16(schema_id);
        put_str(&mut body, topic);
        put_str(&mut body, message_encoding);
        body.put_u16(metadata.len() as u16);
        for (key, value) in metadata {
            put_str(&mut body, key);
            put_str(&mut body, value);
        }

        self.emit_record(OP_CHANNEL, &body)
    }

    /// Append a message frame to the current chunk, flushing the chunk once
    /// it reaches the configured size.
    pub fn write_message(
        &mut self,
        channel_id: u16,
        sequence: u64,
        log_time_ns: u64,
        publish_time_ns: u64,
        data: &[u8],
    ) -> Result<()> {
        self.chunk.put_u16(channel_id);
        self.chunk.put_u64(sequence);
        self.chunk.put_u64(log_time_ns);
        self.chunk.put_u64(publish_time_ns);
        self.chunk.put_u32(data.len() as u32);
        self.chunk.put_slice(data);
        self.chunk_messages += 1;
        self.message_count += 1;

        if self.chunk.len() as u64 >= self.options.chunk_size {
            self.flush_chunk()?;
        }
        Ok(())
    }

    /// Compress and write the accumulating chunk, if any.
    pub fn flush_chunk(&mut self) -> Result<()> {
        if self.chunk.is_empty() {
            return Ok(());
        }

        let uncompressed_size = self.chunk.len() as u64;
        let compressed = match self.options.compression {
            Compression::None => self.chunk.to_vec(),
            Compression::Lz4 => lz4_flex::compress_prepend_size(&self.chunk),
            Compression::Zstd => zstd::bulk::compress(&self.chunk, self.options.compression_level)
                .map_err(|e| Error::Compression(e.to_string()))?,
        };

        let mut body = BytesMut::with_capacity(8 + compressed.len());
        body.put_u64(uncompressed_size);
        body.put_slice(&compressed);
        self.emit_record(OP_CHUNK, &body)?;

        trace!(
            messages = self.chunk_messages,
            uncompressed_size,
            compressed_size = compressed.len(),
            "chunk flushed"
        );
        self.chunk.clear();
        self.chunk_messages = 0;
        self.chunk_count += 1;
        Ok(())
    }

    /// Flush the final chunk, write the footer, and flush the sink.
    /// Returns the total bytes written including the footer.
    pub fn finish(mut self) -> Result<u64> {
        self.flush_chunk()?;

        let crc = self.crc.clone().finalize();
        let mut footer = BytesMut::with_capacity(FOOTER_SIZE);
        footer.put_u64(self.message_count);
        footer.put_u32(self.chunk_count);
        footer.put_u32(crc);
        footer.put_slice(&BAG_MAGIC);
        footer.put_bytes(0, 12);

        // The footer is excluded from its own checksum
        self.sink.write_all(&footer)?;
        self.bytes_written += footer.len() as u64;
        self.sink.flush()?;

        Ok(self.bytes_written)
    }

    /// Total messages written (including those still in the chunk buffer).
    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    /// Bytes emitted to the sink so far (excludes the pending chunk buffer).
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    fn emit_record(&mut self, opcode: u8, body: &[u8]) -> Result<()> {
        let mut frame = BytesMut::with_capacity(5);
        frame.put_u8(opcode);
        frame.put_u32(body.len() as u32);
        self.emit(&frame)?;
        self.emit(body)
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_all(bytes)?;
        self.crc.update(bytes);
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }
}

fn put_str(buf: &mut BytesMut, s: &str) {
    buf.put_u16(s.len() as u16);
    buf.put_slice(s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bag::reader::BagReader;
    use bytes::Bytes;

    fn write_to_vec(f: impl FnOnce(&mut BagWriter<&mut Vec<u8>>)) -> Vec<u8> {
        let mut out = Vec::new();
        let mut writer = BagWriter::new(&mut out, BagWriterOptions::default()).unwrap();
        f(&mut writer);
        writer.finish().unwrap();
        out
    }

    #[test]
    fn test_header_layout() {
        let out = write_to_vec(|_| {});
        assert_eq!(&out[0..4], &BAG_MAGIC);
        assert_eq!(u16::from_be_bytes([out[4], out[5]]), BAG_VERSION);
        assert_eq!(
            u16::from_be_bytes([out[6], out[7]]),
            Compression::None as u16
        );
    }

    #[test]
    fn test_empty_file_is_header_plus_footer() {
        let out = write_to_vec(|_| {});
        assert_eq!(out.len(), HEADER_SIZE + FOOTER_SIZE);
    }

    #[test]
    fn test_footer_magic_and_crc() {
        let out = write_to_vec(|w| {
            w.add_schema(1, "pkg.Type", "protobuf", b"descriptor").unwrap();
        });
        let footer_start = out.len() - FOOTER_SIZE;
        assert_eq!(&out[footer_start + 16..footer_start + 20], &BAG_MAGIC);

        let stored_crc = u32::from_be_bytes(out[footer_start + 12..footer_start + 16].try_into().unwrap());
        assert_eq!(stored_crc, crc32fast::hash(&out[..footer_start]));
    }

    #[test]
    fn test_message_count_in_footer() {
        let out = write_to_vec(|w| {
            w.add_schema(1, "T", "protobuf", b"d").unwrap();
            w.add_channel(1, 1, "t", "protobuf", &[]).unwrap();
            for i in 0..5u64 {
                w.write_message(1, i, i * 10, i * 10, b"payload").unwrap();
            }
        });
        let footer_start = out.len() - FOOTER_SIZE;
        let count = u64::from_be_bytes(out[footer_start..footer_start + 8].try_into().unwrap());
        assert_eq!(count, 5);
    }

    #[test]
    fn test_schema_before_chunk_even_when_interleaved() {
        // Registering a schema while messages accumulate must flush the
        // chunk so the schema record stays at the top level.
        let mut out = Vec::new();
        let mut writer = BagWriter::new(&mut out, BagWriterOptions::default()).unwrap();
        writer.add_schema(1, "A", "protobuf", b"a").unwrap();
        writer.add_channel(1, 1, "a", "protobuf", &[]).unwrap();
        writer.write_message(1, 0, 1, 1, b"x").unwrap();
        writer.add_schema(2, "B", "protobuf", b"b").unwrap();
        writer.add_channel(2, 2, "b", "protobuf", &[]).unwrap();
        writer.write_message(2, 1, 2, 2, b"y").unwrap();
        writer.finish().unwrap();

        let reader = BagReader::new(Bytes::from(out)).unwrap();
        assert_eq!(reader.schemas().len(), 2);
        assert_eq!(reader.channels().len(), 2);
        let messages: Vec<_> = reader.messages().collect::<Result<_>>().unwrap();
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn test_chunk_flush_at_configured_size() {
        let mut out = Vec::new();
        let options = BagWriterOptions {
            chunk_size: 64,
            ..Default::default()
        };
        let mut writer = BagWriter::new(&mut out, options).unwrap();
        writer.add_schema(1, "T", "protobuf", b"d").unwrap();
        writer.add_channel(1, 1, "t", "protobuf", &[]).unwrap();
        for i in 0..10u64 {
            writer.write_message(1, i, i, i, &[0u8; 32]).unwrap();
        }
        writer.finish().unwrap();

        let reader = BagReader::new(Bytes::from(out)).unwrap();
        assert!(reader.chunk_count() > 1, "expected multiple chunks");
        let messages: Vec<_> = reader.messages().collect::<Result<_>>().unwrap();
        assert_eq!(messages.len(), 10);
    }

    #[test]
    fn test_lz4_roundtrip() {
        let mut out = Vec::new();
        let options = BagWriterOptions {
            compression: Compression::Lz4,
            ..Default::default()
        };
        let mut writer = BagWriter::new(&mut out, options).unwrap();
        writer.add_schema(1, "T", "protobuf", b"d").unwrap();
        writer.add_channel(1, 1, "t", "protobuf", &[]).unwrap();
        for i in 0..100u64 {
            writer.write_message(1, i, i * 1000, i * 1000, &[0xAB; 512]).unwrap();
        }
        writer.finish().unwrap();

        let reader = BagReader::new(Bytes::from(out)).unwrap();
        let messages: Vec<_> = reader.messages().collect::<Result<_>>().unwrap();
        assert_eq!(messages.len(), 100);
        assert!(messages.iter().all(|m| m.data.as_ref() == [0xAB; 512]));
    }

    #[test]
    fn test_lz4_compresses_repetitive_payloads() {
        let build = |compression| {
            let mut out = Vec::new();
            let mut writer = BagWriter::new(
                &mut out,
                BagWriterOptions {
                    compression,
                    ..Default::default()
                },
            )
            .unwrap();
            writer.add_schema(1, "T", "protobuf", b"d").unwrap();
            writer.add_channel(1, 1, "t", "protobuf", &[]).unwrap();
            for i in 0..200u64 {
                writer.write_message(1, i, i, i, &[b'Z'; 1024]).unwrap();
            }
            writer.finish().unwrap();
            out
        };

        let plain = build(Compression::None);
        let lz4 = build(Compression::Lz4);
        assert!(
            lz4.len() < plain.len() / 2,
            "lz4 ({}) should be much smaller than none ({})",
            lz4.len(),
            plain.len()
        );
    }

    #[test]
    fn test_zstd_roundtrip_with_level() {
        let mut out = Vec::new();
        let options = BagWriterOptions {
            compression: Compression::Zstd,
            compression_level: 3,
            ..Default::default()
        };
        let mut writer = BagWriter::new(&mut out, options).unwrap();
        writer.add_schema(1, "T", "protobuf", b"d").unwrap();
        writer.add_channel(1, 1, "t", "protobuf", &[]).unwrap();
        for i in 0..50u64 {
            writer
                .write_message(1, i, i, i, format!("payload-{}", i).as_bytes())
                .unwrap();
        }
        writer.finish().unwrap();

        let reader = BagReader::new(Bytes::from(out)).unwrap();
        let messages: Vec<_> = reader.messages().collect::<Result<_>>().unwrap();
        assert_eq!(messages.len(), 50);
        assert_eq!(messages[7].data, Bytes::from("payload-7"));
    }

    #[test]
    fn test_bytes_written_matches_output() {
        let mut out = Vec::new();
        let mut writer = BagWriter::new(&mut out, BagWriterOptions::default()).unwrap();
        writer.add_schema(1, "T", "protobuf", b"d").unwrap();
        writer.write_message(1, 0, 0, 0, b"x").unwrap();
        let total = writer.finish().unwrap();
        assert_eq!(total as usize, out.len());
    }
}
