//! Log Reader Facade
//!
//! Opens a recorded file, validates it, and exposes the channel table plus a
//! lazy message stream. One `LogReader` reads one file; a rotated recording
//! is a directory of independently readable files, so callers list the
//! directory and open each in turn.

use crate::bag::{BagReader, ChannelInfo, MessageIter, SchemaInfo};
use crate::error::Result;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct LogReader {
    path: PathBuf,
    bag: BagReader,
}

impl LogReader {
    /// Open and validate a recorded file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read(&path)?;
        let bag = BagReader::new(Bytes::from(data))?;
        debug!(
            file = %path.display(),
            channels = bag.channels().len(),
            messages = bag.message_count(),
            "opened log file"
        );
        Ok(Self { path, bag })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Topics recorded in this file, in channel-id order.
    pub fn topics(&self) -> Vec<String> {
        self.bag.topics()
    }

    pub fn channels(&self) -> &BTreeMap<u16, ChannelInfo> {
        self.bag.channels()
    }

    pub fn schemas(&self) -> &BTreeMap<u16, SchemaInfo> {
        self.bag.schemas()
    }

    /// Schema backing a channel, when both sides are present.
    pub fn schema_for_channel(&self, channel_id: u16) -> Option<&SchemaInfo> {
        let channel = self.bag.channels().get(&channel_id)?;
        self.bag.schemas().get(&channel.schema_id)
    }

    pub fn message_count(&self) -> u64 {
        self.bag.message_count()
    }

    /// Lazy stream of messages in file order.
    pub fn messages(&self) -> MessageIter<'_> {
        self.bag.messages()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::writer::{FileInfo, LogWriter};
    use std::sync::Arc;
    use tempfile::TempDir;
    use topicbag_core::{Message, TopicInfo};

    fn record_sample(dir: &TempDir) -> PathBuf {
        let mut writer = LogWriter::new(StorageConfig::default());
        writer
            .open(FileInfo::new(dir.path(), "sample", "bag"))
            .unwrap();

        let mut info = TopicInfo::new("imu", "sensors.Imu", "sensors.proto");
        info.channel_id = 1;
        writer
            .register_topic(&mut info, Bytes::from_static(b"descriptors"))
            .unwrap();

        for i in 0..4u64 {
            let message = Arc::new(Message::new(
                "imu",
                Bytes::from(format!("m{}", i)),
                1_000 + i,
                i,
            ));
            writer.write(&message).unwrap();
        }
        let path = writer.current_filename().unwrap().to_path_buf();
        writer.close().unwrap();
        path
    }

    #[test]
    fn test_open_missing_file() {
        assert!(LogReader::open("/does/not/exist.bag").is_err());
    }

    #[test]
    fn test_summary_through_facade() {
        let dir = TempDir::new().unwrap();
        let path = record_sample(&dir);

        let reader = LogReader::open(&path).unwrap();
        assert_eq!(reader.path(), path.as_path());
        assert_eq!(reader.topics(), vec!["imu".to_string()]);
        assert_eq!(reader.message_count(), 4);

        let schema = reader.schema_for_channel(1).unwrap();
        assert_eq!(schema.name, "sensors.Imu");
        assert_eq!(schema.encoding, "protobuf");
        assert!(reader.schema_for_channel(42).is_none());
    }

    #[test]
    fn test_messages_roundtrip_through_facade() {
        let dir = TempDir::new().unwrap();
        let path = record_sample(&dir);

        let reader = LogReader::open(&path).unwrap();
        let messages: Vec<_> = reader.messages().collect::<Result<_>>().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].data, Bytes::from("m0"));
        assert_eq!(messages[3].data, Bytes::from("m3"));
        assert_eq!(messages[2].log_time_ns, 1_002);
    }
}
