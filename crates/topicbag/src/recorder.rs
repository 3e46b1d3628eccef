//! Recorder
//!
//! Subscribes to the configured topics, funnels raw payloads through the
//! bounded [`MessageBuffer`], and drains them in batches to the
//! [`LogWriter`] from a dedicated writer task.
//!
//! ## Lifecycle
//!
//! `Stopped → Running ⇄ Paused → Stopped`. `stop` works from any state, is
//! idempotent, and never panics: every teardown step logs failures instead
//! of propagating them. While paused, subscriptions stay alive and incoming
//! payloads are discarded at the door; records already buffered keep
//! draining to disk.
//!
//! ## Drain-to-completion
//!
//! `stop` flips the writer task's running flag but the task keeps popping
//! until the buffer is empty, so every push the buffer acknowledged reaches
//! the output file before `stop` returns.

use crate::config::ConfigManager;
use crate::error::Result;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use topicbag_core::time::now_ns;
use topicbag_core::{MessageBuffer, TopicInfo};
use topicbag_schema::{DescriptorSetImporter, SchemaRegistry};
use topicbag_storage::{FileInfo, LogWriter};
use topicbag_transport::{BusSubscriber, PayloadHandler, Transport};
use tracing::{debug, error, info, warn};

/// How long the writer task waits for records on each pop.
const POP_WAIT: Duration = Duration::from_millis(100);

/// Idle sleep between empty pops while running.
const IDLE_SLEEP: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecorderState {
    Stopped = 0,
    Running = 1,
    Paused = 2,
}

impl RecorderState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => RecorderState::Running,
            2 => RecorderState::Paused,
            _ => RecorderState::Stopped,
        }
    }
}

/// State shared with the writer task and the subscription handlers.
struct RecorderShared {
    state: AtomicU8,
    /// Writer task keeps going while this is set, then drains and exits
    running: AtomicBool,
    total_messages: AtomicU64,
    dropped_messages: AtomicU64,
    write_batch_size: usize,
    buffer: MessageBuffer,
    storage: Mutex<LogWriter>,
}

impl RecorderShared {
    fn state(&self) -> RecorderState {
        RecorderState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: RecorderState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Subscription callback: stamp and buffer the payload, or discard it
    /// outside the Running state. A refused push is a counted drop.
    async fn on_message_received(&self, topic: &str, payload: Bytes) {
        if self.state() != RecorderState::Running {
            return;
        }

        let timestamp_ns = now_ns();
        if self.buffer.push(topic, payload, timestamp_ns).await {
            self.total_messages.fetch_add(1, Ordering::Relaxed);
        } else {
            self.dropped_messages.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn write_loop(&self) {
        debug!("writer task started");
        loop {
            let running = self.running.load(Ordering::Acquire);
            let queued = self.buffer.size().await;
            if !running && queued == 0 {
                break;
            }

            // After stop, grab everything left in one pass
            let batch_size = if running { self.write_batch_size } else { queued };
            let batch = self.buffer.pop(batch_size.max(1), POP_WAIT).await;

            if !batch.is_empty() {
                let written = self.storage.lock().await.write_batch(&batch);
                if !running {
                    let remaining = self.buffer.size().await;
                    info!(written, remaining, "draining buffer to disk");
                }
            } else if running {
                tokio::time::sleep(IDLE_SLEEP).await;
            }
        }
        debug!("writer task drained and exited");
    }
}

/// Records configured topics from the bus into rotating log files.
pub struct Recorder {
    config: ConfigManager,
    transport: Arc<dyn Transport>,
    registry: SchemaRegistry,
    shared: Arc<RecorderShared>,
    subscribers: Vec<Box<dyn BusSubscriber>>,
    writer_task: Option<JoinHandle<()>>,
}

impl Recorder {
    pub fn new(config: ConfigManager, transport: Arc<dyn Transport>) -> Self {
        let importer =
            DescriptorSetImporter::new(config.storage_config().proto_search_paths.clone());
        let shared = Arc::new(RecorderShared {
            state: AtomicU8::new(RecorderState::Stopped as u8),
            running: AtomicBool::new(false),
            total_messages: AtomicU64::new(0),
            dropped_messages: AtomicU64::new(0),
            write_batch_size: config.storage_config().write_batch_size,
            buffer: MessageBuffer::new(config.buffer_config().clone()),
            storage: Mutex::new(LogWriter::new(config.storage_config().clone())),
        });

        Self {
            config,
            transport,
            registry: SchemaRegistry::new(Box::new(importer)),
            shared,
            subscribers: Vec::new(),
            writer_task: None,
        }
    }

    /// Start recording. Returns true once subscriptions are live and the
    /// writer task is running; any failure fully unwinds and returns false.
    pub async fn start(&mut self) -> bool {
        if self.state() == RecorderState::Running {
            return true;
        }

        let topics = self.config.recorder_config().topics.clone();
        if topics.is_empty() {
            error!("no topics configured, refusing to start");
            return false;
        }

        let output = &self.config.recorder_config().output;
        let file_info = FileInfo::new(
            output.output_path.clone(),
            output.filename_prefix.clone(),
            output.output_format.clone(),
        );
        if let Err(err) = self.shared.storage.lock().await.open(file_info) {
            error!(%err, "failed to open log writer");
            return false;
        }

        self.shared.buffer.clear().await;
        self.shared.buffer.start();
        self.shared.total_messages.store(0, Ordering::Relaxed);
        self.shared.dropped_messages.store(0, Ordering::Relaxed);
        self.shared.set_state(RecorderState::Running);

        // Register every topic before any subscription exists, so no record
        // can reach the writer unregistered
        let mut channel_counter: u16 = 0;
        for topic in &topics {
            channel_counter += 1;
            if let Err(err) = self.register_topic(topic, channel_counter).await {
                error!(topic = %topic.name, type_name = %topic.type_name, %err,
                    "topic registration failed, unwinding start");
                self.unwind_start().await;
                return false;
            }
        }

        for topic in &topics {
            let shared = Arc::clone(&self.shared);
            let topic_name = topic.name.clone();
            let handler: PayloadHandler = Arc::new(move |payload| {
                let shared = Arc::clone(&shared);
                let topic_name = topic_name.clone();
                Box::pin(async move {
                    shared.on_message_received(&topic_name, payload).await;
                })
            });

            let subscription = self.transport.create_subscriber(&topic.name, handler).await;
            match subscription {
                Ok(subscriber) => self.subscribers.push(subscriber),
                Err(err) => {
                    error!(topic = %topic.name, %err, "subscription failed, unwinding start");
                    self.subscribers.clear();
                    self.unwind_start().await;
                    return false;
                }
            }
        }

        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        self.writer_task = Some(tokio::spawn(async move {
            shared.write_loop().await;
        }));

        info!(topics = topics.len(), "recorder started");
        true
    }

    async fn register_topic(&mut self, topic: &crate::config::TopicConfig, channel_id: u16) -> Result<()> {
        self.registry.register(&topic.schema_file)?;
        let blob = self.registry.descriptor_set_for(&topic.type_name)?;

        let mut info = TopicInfo::new(&topic.name, &topic.type_name, &topic.schema_file);
        info.channel_id = channel_id;
        self.shared
            .storage
            .lock()
            .await
            .register_topic(&mut info, blob)?;
        Ok(())
    }

    async fn unwind_start(&mut self) {
        self.shared.set_state(RecorderState::Stopped);
        self.shared.buffer.stop();
        if let Err(err) = self.shared.storage.lock().await.close() {
            warn!(%err, "failed to close log writer while unwinding");
        }
    }

    /// Stop recording: tear down subscriptions, drain the buffer to disk,
    /// close the output file. Idempotent; never panics.
    pub async fn stop(&mut self) {
        if self.state() == RecorderState::Stopped && self.writer_task.is_none() {
            return;
        }

        info!("stopping recorder");
        self.shared.set_state(RecorderState::Stopped);

        // 1. No new callbacks: in-flight ones see state != Running and drop
        self.subscribers.clear();

        let remaining = self.shared.buffer.size().await;
        if remaining > 0 {
            info!(remaining, "records still buffered, writer will drain them");
        }

        // 2. Let the writer task drain to empty and exit
        self.shared.running.store(false, Ordering::Release);
        if let Some(task) = self.writer_task.take() {
            if let Err(err) = task.await {
                error!(%err, "writer task ended abnormally");
            }
        }

        // 3. Stop the buffer and close the file
        self.shared.buffer.stop();
        if let Err(err) = self.shared.storage.lock().await.close() {
            error!(%err, "failed to close log writer");
        }
        info!(
            total = self.total_messages(),
            dropped = self.dropped_messages(),
            "recorder stopped"
        );
    }

    /// Discard incoming payloads while keeping subscriptions and the writer
    /// task alive; buffered records continue draining.
    pub fn pause(&self) {
        if self.state() == RecorderState::Running {
            self.shared.set_state(RecorderState::Paused);
            info!("recorder paused");
        }
    }

    pub fn resume(&self) {
        if self.state() == RecorderState::Paused {
            self.shared.set_state(RecorderState::Running);
            info!("recorder resumed");
        }
    }

    pub fn state(&self) -> RecorderState {
        self.shared.state()
    }

    /// Payloads accepted into the buffer since the last start.
    pub fn total_messages(&self) -> u64 {
        self.shared.total_messages.load(Ordering::Relaxed)
    }

    /// Payloads refused by the buffer (backpressure) since the last start.
    pub fn dropped_messages(&self) -> u64 {
        self.shared.dropped_messages.load(Ordering::Relaxed)
    }

    /// Estimated size of the current output file.
    pub async fn file_size(&self) -> u64 {
        self.shared.storage.lock().await.file_size()
    }

    /// Topics with live subscriptions.
    pub fn topics(&self) -> Vec<String> {
        self.subscribers
            .iter()
            .map(|s| s.topic().to_string())
            .collect()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        // Callers must stop() before dropping; without an async context the
        // best we can do is halt the pipeline and flag the torn shutdown.
        self.shared.set_state(RecorderState::Stopped);
        self.shared.running.store(false, Ordering::Release);
        self.shared.buffer.stop();
        if let Some(task) = self.writer_task.take() {
            task.abort();
            warn!("recorder dropped while running; output file may be unfinished");
        }
    }
}
