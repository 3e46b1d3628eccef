//! Player
//!
//! Streams records out of a recorded log and publishes them back onto the
//! bus, pacing each record against the previous one's log time.
//!
//! ## Timing model
//!
//! Pacing is inter-record and relative to the file: before publishing a
//! record the playback task sleeps `delta / rate`, where `delta` is the log
//! time gap to the previous record. A pause simply shifts the rest of the
//! schedule by the pause duration; relative gaps are never stretched.
//! Rate changes apply at the next gap. A rate of 0 replays as fast as
//! possible; negative configured rates clamp to 1.0.
//!
//! ## Loop mode
//!
//! With `loop_playback` the playback task restarts the iterator when the
//! file ends (an outer loop, so unbounded replays cannot grow the stack)
//! and resets the played counter each pass.

use crate::config::PlayerConfig;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use topicbag_core::time::timestamp_ns_to_string;
use topicbag_core::PROTOBUF_ENCODING;
use topicbag_storage::LogReader;
use topicbag_transport::{BusPublisher, Transport};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlayerState {
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl PlayerState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PlayerState::Playing,
            2 => PlayerState::Paused,
            _ => PlayerState::Stopped,
        }
    }
}

struct PlayerShared {
    state: AtomicU8,
    running: AtomicBool,
    played_messages: AtomicU64,
    /// Playback rate stored as f64 bits so it can change mid-replay
    rate_bits: AtomicU64,
    resume: Notify,
}

impl PlayerShared {
    fn state(&self) -> PlayerState {
        PlayerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: PlayerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn playback_rate(&self) -> f64 {
        f64::from_bits(self.rate_bits.load(Ordering::Relaxed))
    }

    /// Block while paused; returns false when shut down mid-pause.
    async fn wait_while_paused(&self) -> bool {
        loop {
            // Register for wakeups before re-checking state, so a resume or
            // stop landing in between cannot be missed
            let mut notified = std::pin::pin!(self.resume.notified());
            notified.as_mut().enable();
            if self.state() != PlayerState::Paused || !self.is_running() {
                return self.is_running();
            }
            notified.await;
        }
    }

    async fn play_loop(
        &self,
        reader: LogReader,
        publishers: HashMap<String, Arc<dyn BusPublisher>>,
        loop_playback: bool,
    ) {
        loop {
            let mut last_ts: u64 = 0;
            let mut first = true;

            let mut records = reader.messages();
            while self.is_running() {
                let Some(item) = records.next() else { break };
                let record = match item {
                    Ok(record) => record,
                    Err(err) => {
                        error!(%err, "log read failed, stopping playback");
                        break;
                    }
                };

                if self.state() == PlayerState::Paused && !self.wait_while_paused().await {
                    break;
                }

                // Only schema-described protobuf payloads are replayable
                match reader.schema_for_channel(record.channel_id) {
                    Some(schema) if schema.encoding == PROTOBUF_ENCODING => {}
                    _ => continue,
                }
                let Some(channel) = reader.channels().get(&record.channel_id) else {
                    continue;
                };

                let rate = self.playback_rate();
                if !first && rate > 0.0 {
                    let delta_ns = record.log_time_ns.saturating_sub(last_ts);
                    if delta_ns > 0 {
                        let delay = Duration::from_nanos((delta_ns as f64 / rate) as u64);
                        tokio::time::sleep(delay).await;
                    }
                }
                first = false;
                last_ts = record.log_time_ns;

                if let Some(publisher) = publishers.get(&channel.topic) {
                    if publisher.publish(Bytes::clone(&record.data)).await {
                        self.played_messages.fetch_add(1, Ordering::Relaxed);
                    } else {
                        warn!(topic = %channel.topic, sequence = record.sequence,
                            recorded_at = %timestamp_ns_to_string(record.log_time_ns),
                            "bus publish failed, continuing");
                    }
                }
            }

            if self.is_running() && loop_playback {
                debug!("end of file, looping playback");
                self.played_messages.store(0, Ordering::Relaxed);
                continue;
            }
            break;
        }

        self.set_state(PlayerState::Stopped);
        self.running.store(false, Ordering::Release);
        debug!("playback task exited");
    }
}

/// Replays a recorded log file onto the bus.
pub struct Player {
    config: PlayerConfig,
    transport: Arc<dyn Transport>,
    shared: Arc<PlayerShared>,
    topics: Vec<String>,
    play_task: Option<JoinHandle<()>>,
}

impl Player {
    pub fn new(config: PlayerConfig, transport: Arc<dyn Transport>) -> Self {
        // A negative configured rate is nonsense; 0 stays meaningful as
        // "as fast as possible"
        let rate = if config.playback_rate < 0.0 {
            1.0
        } else {
            config.playback_rate
        };

        Self {
            config,
            transport,
            shared: Arc::new(PlayerShared {
                state: AtomicU8::new(PlayerState::Stopped as u8),
                running: AtomicBool::new(false),
                played_messages: AtomicU64::new(0),
                rate_bits: AtomicU64::new(rate.to_bits()),
                resume: Notify::new(),
            }),
            topics: Vec::new(),
            play_task: None,
        }
    }

    /// Open the input file, create one publisher per recorded topic, and
    /// spawn the playback task. Returns false on any startup failure.
    pub async fn start(&mut self) -> bool {
        if self.state() == PlayerState::Playing {
            return true;
        }

        if self.config.input_path.as_os_str().is_empty() {
            error!("no input path configured, refusing to start");
            return false;
        }

        let reader = match LogReader::open(&self.config.input_path) {
            Ok(reader) => reader,
            Err(err) => {
                error!(path = %self.config.input_path.display(), %err, "failed to open log");
                return false;
            }
        };

        let topics = reader.topics();
        if topics.is_empty() {
            error!(path = %self.config.input_path.display(), "log has no channels");
            return false;
        }

        let mut publishers: HashMap<String, Arc<dyn BusPublisher>> = HashMap::new();
        for topic in &topics {
            match self.transport.create_publisher(topic).await {
                Ok(publisher) => {
                    publishers.insert(topic.clone(), publisher);
                }
                Err(err) => {
                    error!(topic = %topic, %err, "failed to create publisher");
                    return false;
                }
            }
        }
        self.topics = topics;

        self.shared.played_messages.store(0, Ordering::Relaxed);
        self.shared.set_state(PlayerState::Playing);
        self.shared.running.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let loop_playback = self.config.loop_playback;
        self.play_task = Some(tokio::spawn(async move {
            shared.play_loop(reader, publishers, loop_playback).await;
        }));

        info!(
            path = %self.config.input_path.display(),
            topics = self.topics.len(),
            "player started"
        );
        true
    }

    /// Stop playback and wait for the playback task to exit. Idempotent.
    pub async fn stop(&mut self) {
        if self.state() == PlayerState::Stopped && self.play_task.is_none() {
            return;
        }

        self.shared.set_state(PlayerState::Stopped);
        self.shared.running.store(false, Ordering::Release);
        self.shared.resume.notify_waiters();

        if let Some(task) = self.play_task.take() {
            if let Err(err) = task.await {
                error!(%err, "playback task ended abnormally");
            }
        }
        info!(played = self.played_messages(), "player stopped");
    }

    /// Hold playback before the next record; the schedule shifts by the
    /// pause duration.
    pub fn pause(&self) {
        if self.state() == PlayerState::Playing {
            self.shared.set_state(PlayerState::Paused);
            info!("player paused");
        }
    }

    pub fn resume(&self) {
        if self.state() == PlayerState::Paused {
            self.shared.set_state(PlayerState::Playing);
            self.shared.resume.notify_waiters();
            info!("player resumed");
        }
    }

    pub fn state(&self) -> PlayerState {
        self.shared.state()
    }

    pub fn played_messages(&self) -> u64 {
        self.shared.played_messages.load(Ordering::Relaxed)
    }

    /// Change the rate; takes effect on the next inter-record delay.
    /// Non-positive values clamp to 1.0.
    pub fn set_playback_rate(&self, rate: f64) {
        let rate = if rate <= 0.0 { 1.0 } else { rate };
        self.shared.rate_bits.store(rate.to_bits(), Ordering::Relaxed);
    }

    pub fn playback_rate(&self) -> f64 {
        self.shared.playback_rate()
    }

    /// Topics available in the opened log.
    pub fn topics(&self) -> Vec<String> {
        self.topics.clone()
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.shared.set_state(PlayerState::Stopped);
        self.shared.running.store(false, Ordering::Release);
        self.shared.resume.notify_waiters();
        if let Some(task) = self.play_task.take() {
            task.abort();
        }
    }
}
