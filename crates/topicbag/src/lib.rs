//! topicbag — Capture and Replay for Topic-Based Messaging
//!
//! topicbag records live publish/subscribe traffic from a topic bus into a
//! self-describing binary log and later replays it onto the same bus with
//! faithful inter-message timing, pause/resume, variable-rate playback, and
//! looping.
//!
//! ## Pipeline
//!
//! ```text
//! bus subscriptions ──▶ MessageBuffer ──▶ writer task ──▶ LogWriter
//!        (record)         (bounded,         (batched        (chunked,
//!                          backpressure)     drain)          rotating)
//!
//! LogReader ──▶ playback task ──▶ bus publishers
//!   (replay)     (timing-preserving, pause/resume, loop)
//! ```
//!
//! The bus itself stays behind the [`topicbag_transport::Transport`] trait;
//! schemas stay behind [`topicbag_schema::SchemaImporter`]. The bundled
//! in-process bus is enough for tests and embedded use.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use topicbag::{ConfigManager, Player, Recorder};
//! use topicbag_transport::MemoryTransport;
//!
//! let config = ConfigManager::from_yaml_file("record.yaml")?;
//! let transport = Arc::new(MemoryTransport::new());
//!
//! let mut recorder = Recorder::new(config.clone(), transport.clone());
//! assert!(recorder.start().await);
//! // ... traffic flows ...
//! recorder.stop().await;
//!
//! let mut player = Player::new(config.player_config().clone(), transport);
//! assert!(player.start().await);
//! ```

pub mod config;
pub mod error;
pub mod player;
pub mod recorder;

pub use config::{ConfigManager, OutputConfig, PlayerConfig, RecorderConfig, TopicConfig};
pub use error::{Error, Result};
pub use player::{Player, PlayerState};
pub use recorder::{Recorder, RecorderState};
