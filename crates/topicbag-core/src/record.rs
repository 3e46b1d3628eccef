//! Captured Message and Topic Metadata
//!
//! This module defines the core `Message` type — one captured (or replayed)
//! record of bus traffic — plus the per-topic registration metadata that ties
//! a topic to its schema and log channel.
//!
//! ## Structure
//! Each message contains:
//! - **topic**: the bus topic the payload arrived on
//! - **payload**: the opaque serialized bytes (the transport has already
//!   serialized the typed message; the recorder never inspects it)
//! - **timestamp_ns**: monotonic capture time in nanoseconds
//! - **sequence**: assigned by the buffer on push, strictly increasing per
//!   recorder run
//!
//! ## Design Decisions
//! - Uses `bytes::Bytes` so payloads are shared between the buffer's global
//!   queue and its per-topic index without copying
//! - Messages are immutable once enqueued; consumers hold `Arc<Message>`
//! - All timestamps are nanoseconds end-to-end

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Message encoding used when a topic carries serialized schema messages.
pub const PROTOBUF_ENCODING: &str = "protobuf";

/// A single captured record of bus traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Topic the payload was received on
    pub topic: String,

    /// Opaque serialized payload
    pub payload: Bytes,

    /// Capture timestamp in nanoseconds
    pub timestamp_ns: u64,

    /// Buffer-assigned sequence number, strictly increasing per recorder run
    pub sequence: u64,

    /// Fully-qualified schema type name, when known
    pub schema_name: Option<String>,

    /// Payload encoding (default "protobuf")
    pub encoding: String,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: Bytes, timestamp_ns: u64, sequence: u64) -> Self {
        Self {
            topic: topic.into(),
            payload,
            timestamp_ns,
            sequence,
            schema_name: None,
            encoding: PROTOBUF_ENCODING.to_string(),
        }
    }

    /// Estimate the in-memory size of this message in bytes.
    pub fn estimated_size(&self) -> usize {
        8 + // timestamp
        8 + // sequence
        self.topic.len() +
        self.payload.len()
    }
}

/// Shared handle to a message; the buffer links the same record into its
/// global queue and its per-topic index.
pub type MessagePtr = Arc<Message>;

/// Registration metadata binding a topic to its schema and log channel.
///
/// `schema_id` and `channel_id` are assigned during registration with the log
/// writer and are stable for the life of one output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicInfo {
    /// Topic name on the bus
    pub topic_name: String,

    /// Fully-qualified schema type name (e.g. "sensors.Imu")
    pub type_name: String,

    /// Schema source file, resolved against the configured search paths
    pub schema_file: String,

    /// Schema id inside the current output file
    #[serde(default)]
    pub schema_id: u16,

    /// Channel id inside the current output file
    #[serde(default)]
    pub channel_id: u16,

    /// Message encoding for this topic
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

fn default_encoding() -> String {
    PROTOBUF_ENCODING.to_string()
}

impl TopicInfo {
    pub fn new(
        topic_name: impl Into<String>,
        type_name: impl Into<String>,
        schema_file: impl Into<String>,
    ) -> Self {
        Self {
            topic_name: topic_name.into(),
            type_name: type_name.into(),
            schema_file: schema_file.into(),
            schema_id: 0,
            channel_id: 0,
            encoding: default_encoding(),
        }
    }
}

/// Compression applied to message chunks in the log container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u16)]
pub enum Compression {
    None = 0,
    Lz4 = 1,
    Zstd = 2,
}

impl TryFrom<u16> for Compression {
    type Error = crate::Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Lz4),
            2 => Ok(Compression::Zstd),
            _ => Err(crate::Error::InvalidCompression(value)),
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Compression::None),
            "lz4" => Ok(Compression::Lz4),
            "zstd" => Ok(Compression::Zstd),
            other => Err(crate::Error::UnknownCompressionName(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // Message construction
    // ---------------------------------------------------------------

    #[test]
    fn test_message_new() {
        let msg = Message::new("imu", Bytes::from("payload"), 1_000_000_000, 7);
        assert_eq!(msg.topic, "imu");
        assert_eq!(msg.payload, Bytes::from("payload"));
        assert_eq!(msg.timestamp_ns, 1_000_000_000);
        assert_eq!(msg.sequence, 7);
        assert!(msg.schema_name.is_none());
        assert_eq!(msg.encoding, PROTOBUF_ENCODING);
    }

    #[test]
    fn test_message_empty_payload() {
        let msg = Message::new("t", Bytes::new(), 0, 0);
        assert!(msg.payload.is_empty());
    }

    #[test]
    fn test_message_preserves_binary_payload() {
        let payload = Bytes::from(vec![0u8, 1, 2, 127, 128, 255]);
        let msg = Message::new("t", payload.clone(), 0, 0);
        assert_eq!(msg.payload, payload);
    }

    // ---------------------------------------------------------------
    // estimated_size
    // ---------------------------------------------------------------

    #[test]
    fn test_estimated_size() {
        let msg = Message::new("abc", Bytes::from("12345"), 0, 0);
        // 8 (timestamp) + 8 (sequence) + 3 (topic) + 5 (payload) = 24
        assert_eq!(msg.estimated_size(), 24);
    }

    #[test]
    fn test_estimated_size_empty() {
        let msg = Message::new("", Bytes::new(), 0, 0);
        assert_eq!(msg.estimated_size(), 16);
    }

    #[test]
    fn test_estimated_size_large_payload() {
        let msg = Message::new("t", Bytes::from(vec![0u8; 100_000]), 0, 0);
        assert_eq!(msg.estimated_size(), 17 + 100_000);
    }

    // ---------------------------------------------------------------
    // Serde round-trip
    // ---------------------------------------------------------------

    #[test]
    fn test_message_serde_roundtrip() {
        let msg = Message::new("camera/front", Bytes::from(vec![1u8, 2, 3]), 42, 9);
        let json = serde_json::to_string(&msg).expect("serialize");
        let back: Message = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(msg, back);
    }

    // ---------------------------------------------------------------
    // TopicInfo
    // ---------------------------------------------------------------

    #[test]
    fn test_topic_info_new_defaults() {
        let info = TopicInfo::new("imu", "sensors.Imu", "sensors.proto");
        assert_eq!(info.topic_name, "imu");
        assert_eq!(info.type_name, "sensors.Imu");
        assert_eq!(info.schema_file, "sensors.proto");
        assert_eq!(info.schema_id, 0);
        assert_eq!(info.channel_id, 0);
        assert_eq!(info.encoding, PROTOBUF_ENCODING);
    }

    #[test]
    fn test_topic_info_serde_defaults_ids() {
        let yaml = r#"{"topic_name":"t","type_name":"pkg.T","schema_file":"f.proto"}"#;
        let info: TopicInfo = serde_json::from_str(yaml).expect("deserialize");
        assert_eq!(info.schema_id, 0);
        assert_eq!(info.channel_id, 0);
        assert_eq!(info.encoding, PROTOBUF_ENCODING);
    }

    // ---------------------------------------------------------------
    // Compression conversions
    // ---------------------------------------------------------------

    #[test]
    fn test_compression_repr_values() {
        assert_eq!(Compression::None as u16, 0);
        assert_eq!(Compression::Lz4 as u16, 1);
        assert_eq!(Compression::Zstd as u16, 2);
    }

    #[test]
    fn test_compression_try_from_valid() {
        for val in 0u16..=2 {
            let c = Compression::try_from(val).unwrap();
            assert_eq!(c as u16, val);
        }
    }

    #[test]
    fn test_compression_try_from_invalid() {
        assert!(Compression::try_from(3u16).is_err());
        assert!(Compression::try_from(u16::MAX).is_err());
    }

    #[test]
    fn test_compression_from_str() {
        assert_eq!("none".parse::<Compression>().unwrap(), Compression::None);
        assert_eq!("lz4".parse::<Compression>().unwrap(), Compression::Lz4);
        assert_eq!("zstd".parse::<Compression>().unwrap(), Compression::Zstd);
        assert!("gzip".parse::<Compression>().is_err());
    }

    #[test]
    fn test_compression_serde_lowercase() {
        let c: Compression = serde_json::from_str("\"lz4\"").unwrap();
        assert_eq!(c, Compression::Lz4);
        assert_eq!(serde_json::to_string(&Compression::Zstd).unwrap(), "\"zstd\"");
    }
}
