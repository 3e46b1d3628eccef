//! Log Writer Facade
//!
//! `LogWriter` is what the recorder talks to: it owns the open bag file,
//! the topic registration tables, and the rotation policy.
//!
//! ## Registration
//!
//! `register_topic` assigns the schema id (registration order, starting at
//! 1) and writes the schema and channel records. The channel id is supplied
//! by the caller — the recorder owns that counter. The descriptor-set blob
//! and channel parameters are cached so rotation can re-register everything
//! into the next file without re-running schema imports.
//!
//! ## Rotation
//!
//! After every write the facade adds the payload size plus the fixed frame
//! overhead to its size estimate. Once `split_by_size` is on and the
//! estimate reaches `max_file_size`, the current file is finished and a new
//! one is opened under a fresh timestamped name, with all schemas and
//! channels re-registered under their existing ids. Only one file is open
//! at any moment; readers of a rotated set list the directory.
//!
//! ## Failure policy
//!
//! A single failed record write is logged and dropped; the batch continues.
//! Errors opening a file are fatal to `open` and to the rotation attempt.

use crate::bag::{BagWriter, BagWriterOptions, MESSAGE_FRAME_OVERHEAD};
use crate::config::StorageConfig;
use crate::error::{Error, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use topicbag_core::time::unique_filename;
use topicbag_core::{MessagePtr, TopicInfo};
use tracing::{error, info, warn};

/// Live state of the output file.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub is_open: bool,
    pub size_bytes: u64,
    pub prefix: String,
    pub extension: String,
    pub dir: PathBuf,
    pub current_filename: Option<PathBuf>,
    pub format: String,
}

impl FileInfo {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        Self {
            is_open: false,
            size_bytes: 0,
            prefix: prefix.into(),
            format: extension.clone(),
            extension,
            dir: dir.into(),
            current_filename: None,
        }
    }
}

struct RegisteredTopic {
    info: TopicInfo,
    schema_blob: Bytes,
    metadata: Vec<(String, String)>,
}

/// Facade over the container writer: open/rotate files, register topics,
/// write batches.
pub struct LogWriter {
    config: StorageConfig,
    file_info: FileInfo,
    writer: Option<BagWriter<BufWriter<File>>>,
    /// Registration order preserved for rotation replay
    registered: Vec<RegisteredTopic>,
    /// Topic name to index into `registered`
    by_topic: HashMap<String, usize>,
}

impl LogWriter {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            file_info: FileInfo::new(".", "topicbag", "bag"),
            writer: None,
            registered: Vec::new(),
            by_topic: HashMap::new(),
        }
    }

    /// Open the first output file described by `file_info`.
    pub fn open(&mut self, file_info: FileInfo) -> Result<()> {
        if self.writer.is_some() {
            return Err(Error::AlreadyOpen);
        }

        self.file_info = file_info;
        self.registered.clear();
        self.by_topic.clear();
        self.open_next_file()?;
        Ok(())
    }

    /// Register a topic: write its schema and channel records and fill in
    /// the assigned schema id. The channel id in `info` is caller-assigned.
    pub fn register_topic(&mut self, info: &mut TopicInfo, schema_blob: Bytes) -> Result<()> {
        let writer = self.writer.as_mut().ok_or(Error::NotOpen)?;
        if self.by_topic.contains_key(&info.topic_name) {
            return Err(Error::InvalidRecord(format!(
                "topic registered twice: {}",
                info.topic_name
            )));
        }

        let schema_id = (self.registered.len() + 1) as u16;
        info.schema_id = schema_id;

        let metadata = vec![("message_type".to_string(), info.type_name.clone())];
        writer.add_schema(schema_id, &info.type_name, &info.encoding, &schema_blob)?;
        writer.add_channel(
            info.channel_id,
            schema_id,
            &info.topic_name,
            &info.encoding,
            &metadata,
        )?;

        info!(
            topic = %info.topic_name,
            type_name = %info.type_name,
            schema_id,
            channel_id = info.channel_id,
            "topic registered"
        );

        self.by_topic
            .insert(info.topic_name.clone(), self.registered.len());
        self.registered.push(RegisteredTopic {
            info: info.clone(),
            schema_blob,
            metadata,
        });
        Ok(())
    }

    /// Write one message. The topic must have been registered.
    pub fn write(&mut self, message: &MessagePtr) -> Result<()> {
        let index = *self
            .by_topic
            .get(&message.topic)
            .ok_or_else(|| Error::UnknownTopic(message.topic.clone()))?;
        let channel_id = self.registered[index].info.channel_id;
        let writer = self.writer.as_mut().ok_or(Error::NotOpen)?;

        writer.write_message(
            channel_id,
            message.sequence,
            message.timestamp_ns,
            message.timestamp_ns,
            &message.payload,
        )?;

        self.file_info.size_bytes += message.payload.len() as u64 + MESSAGE_FRAME_OVERHEAD;
        self.rotate_if_needed()?;
        Ok(())
    }

    /// Write a batch best-effort: a failing record is logged and dropped,
    /// the rest of the batch still goes out. Returns how many were written.
    pub fn write_batch(&mut self, batch: &[MessagePtr]) -> usize {
        let mut written = 0;
        for message in batch {
            match self.write(message) {
                Ok(()) => written += 1,
                Err(err) => {
                    error!(
                        topic = %message.topic,
                        sequence = message.sequence,
                        %err,
                        "dropping record"
                    );
                }
            }
        }
        written
    }

    /// Finish the current file. Safe to call repeatedly.
    pub fn close(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            let bytes = writer.finish()?;
            info!(
                file = ?self.file_info.current_filename,
                bytes,
                "log file closed"
            );
        }
        self.file_info.is_open = false;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Estimated size of the current file.
    pub fn file_size(&self) -> u64 {
        self.file_info.size_bytes
    }

    pub fn file_info(&self) -> &FileInfo {
        &self.file_info
    }

    pub fn current_filename(&self) -> Option<&Path> {
        self.file_info.current_filename.as_deref()
    }

    /// Registered topic names in registration order.
    pub fn topics(&self) -> Vec<String> {
        self.registered
            .iter()
            .map(|r| r.info.topic_name.clone())
            .collect()
    }

    fn writer_options(&self) -> BagWriterOptions {
        BagWriterOptions {
            compression: self.config.compression_type,
            compression_level: self.config.compression_level,
            chunk_size: self.config.chunk_size,
        }
    }

    fn generate_filename(&self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.file_info.dir)?;
        let base = unique_filename(&self.file_info.prefix, &self.file_info.extension);
        let mut candidate = self.file_info.dir.join(&base);

        // Rotation within one second would reuse the timestamped name;
        // suffix a counter instead of overwriting.
        let mut attempt = 1;
        while candidate.exists() {
            let stem = base.trim_end_matches(&format!(".{}", self.file_info.extension));
            candidate = self
                .file_info
                .dir
                .join(format!("{}_{}.{}", stem, attempt, self.file_info.extension));
            attempt += 1;
        }
        Ok(candidate)
    }

    fn open_next_file(&mut self) -> Result<()> {
        let path = self.generate_filename()?;
        info!(file = %path.display(), "opening log file");

        let writer = BagWriter::create(&path, self.writer_options())?;
        self.writer = Some(writer);
        self.file_info.current_filename = Some(path);
        self.file_info.is_open = true;
        self.file_info.size_bytes = 0;
        Ok(())
    }

    fn rotate_if_needed(&mut self) -> Result<()> {
        if !self.config.split_by_size || self.file_info.size_bytes < self.config.max_file_size {
            return Ok(());
        }

        info!(
            size = self.file_info.size_bytes,
            max = self.config.max_file_size,
            "size limit reached, rotating log file"
        );

        if let Some(writer) = self.writer.take() {
            writer.finish()?;
        }
        self.open_next_file()?;

        // Replay every registration into the new file under the same ids
        for (index, registered) in self.registered.iter().enumerate() {
            let schema_id = (index + 1) as u16;
            let writer = self.writer.as_mut().ok_or(Error::NotOpen)?;
            writer.add_schema(
                schema_id,
                &registered.info.type_name,
                &registered.info.encoding,
                &registered.schema_blob,
            )?;
            writer.add_channel(
                registered.info.channel_id,
                schema_id,
                &registered.info.topic_name,
                &registered.info.encoding,
                &registered.metadata,
            )?;
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if self.writer.is_some() {
            if let Err(err) = self.close() {
                warn!(%err, "failed to close log writer on drop");
            }
        }
    }
}
