//! Bag Reader - Validating and Streaming Log Files
//!
//! `BagReader` holds the complete file contents as `Bytes`, validates the
//! envelope (magic, version, footer CRC), and builds the schema/channel
//! tables from a cheap top-level scan that never touches chunk contents.
//! Messages are streamed by [`MessageIter`], which decompresses one chunk at
//! a time; message payloads are zero-copy slices of the decompressed chunk.
//!
//! Unknown record opcodes are skipped so older readers survive newer files.

use crate::bag::{BAG_MAGIC, BAG_VERSION, FOOTER_SIZE, HEADER_SIZE, OP_CHANNEL, OP_CHUNK, OP_SCHEMA};
use crate::error::{Error, Result};
use bytes::{Buf, Bytes};
use std::collections::BTreeMap;
use topicbag_core::Compression;
use tracing::warn;

/// An embedded schema record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaInfo {
    pub id: u16,
    /// Fully-qualified type name
    pub name: String,
    pub encoding: String,
    /// Serialized descriptor set
    pub data: Bytes,
}

/// A channel record binding a topic to a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: u16,
    pub schema_id: u16,
    pub topic: String,
    pub message_encoding: String,
    pub metadata: Vec<(String, String)>,
}

/// One message as stored in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub channel_id: u16,
    pub sequence: u64,
    pub log_time_ns: u64,
    pub publish_time_ns: u64,
    pub data: Bytes,
}

/// Validated, summary-scanned bag file.
#[derive(Debug)]
pub struct BagReader {
    data: Bytes,
    compression: Compression,
    schemas: BTreeMap<u16, SchemaInfo>,
    channels: BTreeMap<u16, ChannelInfo>,
    /// (body start, body length) of each chunk record
    chunks: Vec<(usize, usize)>,
    message_count: u64,
}

impl BagReader {
    pub fn new(data: Bytes) -> Result<Self> {
        if data.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(Error::Truncated(format!(
                "file is {} bytes, smaller than header + footer",
                data.len()
            )));
        }

        let compression = Self::read_header(&data)?;
        let message_count = Self::read_footer(&data)?;

        let mut reader = Self {
            data,
            compression,
            schemas: BTreeMap::new(),
            channels: BTreeMap::new(),
            chunks: Vec::new(),
            message_count,
        };
        reader.scan_records()?;
        Ok(reader)
    }

    fn read_header(data: &Bytes) -> Result<Compression> {
        let mut cursor = &data[..HEADER_SIZE];
        let mut magic = [0u8; 4];
        cursor.copy_to_slice(&mut magic);
        if magic != BAG_MAGIC {
            return Err(Error::InvalidMagic);
        }

        let version = cursor.get_u16();
        if version != BAG_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        Ok(Compression::try_from(cursor.get_u16())?)
    }

    fn read_footer(data: &Bytes) -> Result<u64> {
        let footer_start = data.len() - FOOTER_SIZE;
        let mut cursor = &data[footer_start..];

        let message_count = cursor.get_u64();
        let _chunk_count = cursor.get_u32();

        let stored_crc = cursor.get_u32();
        let calculated_crc = crc32fast::hash(&data[..footer_start]);
        if stored_crc != calculated_crc {
            return Err(Error::CrcMismatch);
        }

        let mut magic = [0u8; 4];
        cursor.copy_to_slice(&mut magic);
        if magic != BAG_MAGIC {
            return Err(Error::InvalidMagic);
        }

        Ok(message_count)
    }

    /// Top-level record scan: collects schemas, channels, and chunk spans.
    fn scan_records(&mut self) -> Result<()> {
        let end = self.data.len() - FOOTER_SIZE;
        let mut pos = HEADER_SIZE;

        while pos < end {
            if pos + 5 > end {
                return Err(Error::Truncated("record frame header".to_string()));
            }
            let opcode = self.data[pos];
            let mut length_bytes = &self.data[pos + 1..pos + 5];
            let length = length_bytes.get_u32() as usize;
            let body_start = pos + 5;
            if body_start + length > end {
                return Err(Error::Truncated(format!(
                    "record body of {} bytes at offset {}",
                    length, body_start
                )));
            }

            match opcode {
                OP_SCHEMA => {
                    let schema = parse_schema(&self.data, body_start, length)?;
                    self.schemas.insert(schema.id, schema);
                }
                OP_CHANNEL => {
                    let channel = parse_channel(&self.data[body_start..body_start + length])?;
                    self.channels.insert(channel.id, channel);
                }
                OP_CHUNK => {
                    if length < 8 {
                        return Err(Error::InvalidRecord(
                            "chunk shorter than its size field".to_string(),
                        ));
                    }
                    self.chunks.push((body_start, length));
                }
                other => {
                    warn!(opcode = other, offset = pos, "skipping unknown record");
                }
            }
            pos = body_start + length;
        }
        Ok(())
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn schemas(&self) -> &BTreeMap<u16, SchemaInfo> {
        &self.schemas
    }

    pub fn channels(&self) -> &BTreeMap<u16, ChannelInfo> {
        &self.channels
    }

    /// Topics in channel-id order.
    pub fn topics(&self) -> Vec<String> {
        self.channels.values().map(|c| c.topic.clone()).collect()
    }

    pub fn message_count(&self) -> u64 {
        self.message_count
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Lazy message stream; one chunk is decompressed at a time.
    pub fn messages(&self) -> MessageIter<'_> {
        MessageIter {
            reader: self,
            next_chunk: 0,
            current: Bytes::new(),
            pos: 0,
            failed: false,
        }
    }

    fn decompress_chunk(&self, index: usize) -> Result<Bytes> {
        let (start, length) = self.chunks[index];
        let body = &self.data[start..start + length];
        let mut cursor = body;
        let uncompressed_size = cursor.get_u64() as usize;
        let payload = &body[8..];

        match self.compression {
            Compression::None => {
                if payload.len() != uncompressed_size {
                    return Err(Error::InvalidRecord(
                        "uncompressed chunk size mismatch".to_string(),
                    ));
                }
                Ok(self.data.slice(start + 8..start + length))
            }
            Compression::Lz4 => {
                let decompressed = lz4_flex::decompress_size_prepended(payload)
                    .map_err(|e| Error::Decompression(e.to_string()))?;
                if decompressed.len() != uncompressed_size {
                    return Err(Error::Decompression("lz4 chunk size mismatch".to_string()));
                }
                Ok(Bytes::from(decompressed))
            }
            Compression::Zstd => {
                let decompressed = zstd::bulk::decompress(payload, uncompressed_size)
                    .map_err(|e| Error::Decompression(e.to_string()))?;
                Ok(Bytes::from(decompressed))
            }
        }
    }
}

/// Streaming iterator over every message in file order.
pub struct MessageIter<'a> {
    reader: &'a BagReader,
    next_chunk: usize,
    current: Bytes,
    pos: usize,
    failed: bool,
}

impl MessageIter<'_> {
    fn parse_next(&mut self) -> Result<LogMessage> {
        let mut cursor = &self.current[self.pos..];
        if cursor.len() < 30 {
            return Err(Error::Truncated("message frame".to_string()));
        }
        let channel_id = cursor.get_u16();
        let sequence = cursor.get_u64();
        let log_time_ns = cursor.get_u64();
        let publish_time_ns = cursor.get_u64();
        let data_len = cursor.get_u32() as usize;
        if cursor.len() < data_len {
            return Err(Error::Truncated("message payload".to_string()));
        }

        let data_start = self.pos + 30;
        let data = self.current.slice(data_start..data_start + data_len);
        self.pos = data_start + data_len;

        Ok(LogMessage {
            channel_id,
            sequence,
            log_time_ns,
            publish_time_ns,
            data,
        })
    }
}

impl Iterator for MessageIter<'_> {
    type Item = Result<LogMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if self.pos < self.current.len() {
                match self.parse_next() {
                    Ok(message) => return Some(Ok(message)),
                    Err(err) => {
                        self.failed = true;
                        return Some(Err(err));
                    }
                }
            }
            if self.next_chunk >= self.reader.chunks.len() {
                return None;
            }
            match self.reader.decompress_chunk(self.next_chunk) {
                Ok(chunk) => {
                    self.next_chunk += 1;
                    self.current = chunk;
                    self.pos = 0;
                }
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

fn parse_schema(data: &Bytes, body_start: usize, length: usize) -> Result<SchemaInfo> {
    let body = &data[body_start..body_start + length];
    let mut pos = 0usize;

    let id = read_u16(body, &mut pos)?;
    let name = read_str(body, &mut pos)?;
    let encoding = read_str(body, &mut pos)?;

    if pos + 4 > body.len() {
        return Err(Error::Truncated("schema data length".to_string()));
    }
    let mut cursor = &body[pos..];
    let data_len = cursor.get_u32() as usize;
    pos += 4;
    if pos + data_len > body.len() {
        return Err(Error::Truncated("schema data".to_string()));
    }
    let blob = data.slice(body_start + pos..body_start + pos + data_len);

    Ok(SchemaInfo {
        id,
        name,
        encoding,
        data: blob,
    })
}

fn parse_channel(body: &[u8]) -> Result<ChannelInfo> {
    let mut pos = 0usize;
    let id = read_u16(body, &mut pos)?;
    let schema_id = read_u16(body, &mut pos)?;
    let topic = read_str(body, &mut pos)?;
    let message_encoding = read_str(body, &mut pos)?;
    let metadata_count = read_u16(body, &mut pos)? as usize;

    let mut metadata = Vec::with_capacity(metadata_count);
    for _ in 0..metadata_count {
        let key = read_str(body, &mut pos)?;
        let value = read_str(body, &mut pos)?;
        metadata.push((key, value));
    }

    Ok(ChannelInfo {
        id,
        schema_id,
        topic,
        message_encoding,
        metadata,
    })
}

fn read_u16(body: &[u8], pos: &mut usize) -> Result<u16> {
    if *pos + 2 > body.len() {
        return Err(Error::Truncated("u16 field".to_string()));
    }
    let value = u16::from_be_bytes([body[*pos], body[*pos + 1]]);
    *pos += 2;
    Ok(value)
}

fn read_str(body: &[u8], pos: &mut usize) -> Result<String> {
    let len = read_u16(body, pos)? as usize;
    if *pos + len > body.len() {
        return Err(Error::Truncated("string field".to_string()));
    }
    let s = std::str::from_utf8(&body[*pos..*pos + len])
        .map_err(|_| Error::InvalidRecord("string field is not UTF-8".to_string()))?
        .to_string();
    *pos += len;
    Ok(s)
}
