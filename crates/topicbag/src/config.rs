//! Configuration
//!
//! Value structs populated from YAML, consumed read-only by the recorder and
//! player. A single document carries optional sections; absent sections keep
//! their defaults:
//!
//! ```yaml
//! output:
//!   output_path: ./recordings
//!   filename_prefix: run
//!   output_format: bag
//! topics:
//!   - name: imu
//!     type: sensors.Imu
//!     proto_file: sensors.proto
//! player:
//!   input_path: ./recordings/run_2025_05_22-10_00_00.bag
//!   loop_playback: false
//!   playback_rate: 1.0
//! storage:
//!   compression:
//!     type: lz4
//!     level: 0
//!   search_paths: [./schemas]
//!   write_batch_size: 1000
//!   max_file_size: 1073741824
//!   chunk_size: 1048576
//!   split_by_size: true
//! buffer:
//!   buffer_size: 10000
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use topicbag_core::{BufferConfig, Compression};
use topicbag_storage::StorageConfig;

/// Where and how output files are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    #[serde(default = "default_filename_prefix")]
    pub filename_prefix: String,

    /// Output format and filename extension
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("./topicbags")
}

fn default_filename_prefix() -> String {
    "topicbag".to_string()
}

fn default_output_format() -> String {
    "bag".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            filename_prefix: default_filename_prefix(),
            output_format: default_output_format(),
        }
    }
}

/// One topic to record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    pub name: String,

    /// Fully-qualified schema type name
    #[serde(rename = "type")]
    pub type_name: String,

    /// Schema source file, resolved against the storage search paths
    #[serde(rename = "proto_file")]
    pub schema_file: String,
}

/// Recorder configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecorderConfig {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub topics: Vec<TopicConfig>,
}

/// Player configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub input_path: PathBuf,

    #[serde(default)]
    pub loop_playback: bool,

    /// 1.0 replays at recorded cadence, 2.0 halves delays, 0.0 replays as
    /// fast as possible
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f64,
}

fn default_playback_rate() -> f64 {
    1.0
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::new(),
            loop_playback: false,
            playback_rate: default_playback_rate(),
        }
    }
}

/// YAML shape of the storage section: compression is nested.
#[derive(Debug, Default, Deserialize)]
struct StorageSection {
    #[serde(default)]
    compression: CompressionSection,
    #[serde(default)]
    search_paths: Vec<PathBuf>,
    write_batch_size: Option<usize>,
    max_file_size: Option<u64>,
    chunk_size: Option<u64>,
    split_by_size: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct CompressionSection {
    #[serde(rename = "type")]
    kind: Option<Compression>,
    level: Option<i32>,
}

impl StorageSection {
    fn apply(self, mut config: StorageConfig) -> StorageConfig {
        if let Some(kind) = self.compression.kind {
            config.compression_type = kind;
        }
        if let Some(level) = self.compression.level {
            config.compression_level = level;
        }
        if !self.search_paths.is_empty() {
            config.proto_search_paths = self.search_paths;
        }
        if let Some(batch) = self.write_batch_size {
            config.write_batch_size = batch;
        }
        if let Some(size) = self.max_file_size {
            config.max_file_size = size;
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = size;
        }
        if let Some(split) = self.split_by_size {
            config.split_by_size = split;
        }
        config
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    output: Option<OutputConfig>,
    #[serde(default)]
    topics: Vec<TopicConfig>,
    player: Option<PlayerConfig>,
    storage: Option<StorageSection>,
    buffer: Option<BufferConfig>,
}

/// Holds every configuration section and hands out read-only references.
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    recorder: RecorderConfig,
    player: PlayerConfig,
    storage: StorageConfig,
    buffer: BufferConfig,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every present section from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Load every present section from a YAML string.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let raw: RawDocument = serde_yaml::from_str(text)?;
        let mut manager = Self::new();
        if let Some(output) = raw.output {
            manager.recorder.output = output;
        }
        manager.recorder.topics = raw.topics;
        if let Some(player) = raw.player {
            manager.player = player;
        }
        if let Some(storage) = raw.storage {
            manager.storage = storage.apply(manager.storage);
        }
        if let Some(buffer) = raw.buffer {
            manager.buffer = buffer;
        }
        Ok(manager)
    }

    pub fn recorder_config(&self) -> &RecorderConfig {
        &self.recorder
    }

    pub fn player_config(&self) -> &PlayerConfig {
        &self.player
    }

    pub fn storage_config(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn buffer_config(&self) -> &BufferConfig {
        &self.buffer
    }

    pub fn set_recorder_config(&mut self, config: RecorderConfig) {
        self.recorder = config;
    }

    pub fn set_player_config(&mut self, config: PlayerConfig) {
        self.player = config;
    }

    pub fn set_storage_config(&mut self, config: StorageConfig) {
        self.storage = config;
    }

    pub fn set_buffer_config(&mut self, config: BufferConfig) {
        self.buffer = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let manager = ConfigManager::from_yaml_str("{}").unwrap();
        assert_eq!(manager.recorder_config().output.filename_prefix, "topicbag");
        assert_eq!(manager.recorder_config().output.output_format, "bag");
        assert!(manager.recorder_config().topics.is_empty());
        assert!(!manager.player_config().loop_playback);
        assert_eq!(manager.player_config().playback_rate, 1.0);
        assert_eq!(manager.buffer_config().buffer_size, 10_000);
        assert_eq!(manager.storage_config().write_batch_size, 1000);
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
output:
  output_path: /tmp/bags
  filename_prefix: run
  output_format: bag
topics:
  - name: imu
    type: sensors.Imu
    proto_file: sensors.proto
  - name: gps
    type: sensors.Gps
    proto_file: sensors.proto
player:
  input_path: /tmp/bags/run.bag
  loop_playback: true
  playback_rate: 2.0
storage:
  compression:
    type: zstd
    level: 3
  search_paths: [/tmp/schemas]
  write_batch_size: 64
  max_file_size: 4096
  chunk_size: 512
  split_by_size: false
buffer:
  buffer_size: 42
"#;
        let manager = ConfigManager::from_yaml_str(yaml).unwrap();

        let recorder = manager.recorder_config();
        assert_eq!(recorder.output.output_path, PathBuf::from("/tmp/bags"));
        assert_eq!(recorder.topics.len(), 2);
        assert_eq!(recorder.topics[0].name, "imu");
        assert_eq!(recorder.topics[0].type_name, "sensors.Imu");
        assert_eq!(recorder.topics[1].schema_file, "sensors.proto");

        let player = manager.player_config();
        assert!(player.loop_playback);
        assert_eq!(player.playback_rate, 2.0);

        let storage = manager.storage_config();
        assert_eq!(storage.compression_type, Compression::Zstd);
        assert_eq!(storage.compression_level, 3);
        assert_eq!(storage.proto_search_paths, vec![PathBuf::from("/tmp/schemas")]);
        assert_eq!(storage.write_batch_size, 64);
        assert_eq!(storage.max_file_size, 4096);
        assert_eq!(storage.chunk_size, 512);
        assert!(!storage.split_by_size);

        assert_eq!(manager.buffer_config().buffer_size, 42);
    }

    #[test]
    fn test_partial_storage_section_keeps_other_defaults() {
        let yaml = r#"
storage:
  compression:
    type: lz4
"#;
        let manager = ConfigManager::from_yaml_str(yaml).unwrap();
        let storage = manager.storage_config();
        assert_eq!(storage.compression_type, Compression::Lz4);
        assert_eq!(storage.compression_level, 0);
        assert_eq!(storage.write_batch_size, 1000);
        assert!(storage.split_by_size);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(ConfigManager::from_yaml_str("topics: {not: [valid").is_err());
    }

    #[test]
    fn test_unknown_compression_is_an_error() {
        let yaml = "storage:\n  compression:\n    type: gzip\n";
        assert!(ConfigManager::from_yaml_str(yaml).is_err());
    }
}
