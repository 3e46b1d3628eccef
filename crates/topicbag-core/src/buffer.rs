//! Bounded Message Buffer
//!
//! This module implements the bounded FIFO that sits between the bus
//! subscription callbacks (many producers) and the recorder's writer task
//! (single consumer).
//!
//! ## Behavior
//!
//! - **Backpressure**: a push into a full buffer waits up to 100 ms for
//!   space, then is refused. The recorder counts refusals as drops and does
//!   not retry; stable memory wins over completeness.
//! - **Per-topic index**: every queued record is also linked into a
//!   per-topic sub-queue. Both queues share the same `Arc<Message>` handles,
//!   so `|Q| == Σ|T[t]|` at all times and a record removed from the head of
//!   the global queue is, by construction, the head of its topic queue.
//! - **Drain on stop**: `pop` keeps returning queued records after `stop`,
//!   so the writer can drain the buffer to empty before shutting down. An
//!   acknowledged push is never lost.
//!
//! ## Concurrency
//!
//! One async mutex guards both queues; two `Notify` values stand in for the
//! not-empty / not-full condition variables. The running flag is atomic so
//! producers can bail out without taking the lock.

use crate::record::{Message, MessagePtr};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

/// How long a push into a full buffer waits for space before refusing.
const PUSH_FULL_WAIT: Duration = Duration::from_millis(100);

/// Buffer sizing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferConfig {
    /// Maximum number of buffered records
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_buffer_size() -> usize {
    10_000
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

struct Inner {
    /// Global FIFO of every buffered record
    queue: VecDeque<MessagePtr>,
    /// Per-topic sub-queues sharing the same record handles
    topic_queues: HashMap<String, VecDeque<MessagePtr>>,
    /// Next sequence number to assign; reset by `clear`
    next_sequence: u64,
}

/// Bounded multi-producer / single-consumer message buffer with a per-topic
/// secondary index.
pub struct MessageBuffer {
    capacity: usize,
    inner: Mutex<Inner>,
    not_empty: Notify,
    not_full: Notify,
    running: AtomicBool,
}

impl MessageBuffer {
    pub fn new(config: BufferConfig) -> Self {
        Self {
            capacity: config.buffer_size.max(1),
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                topic_queues: HashMap::new(),
                next_sequence: 0,
            }),
            not_empty: Notify::new(),
            not_full: Notify::new(),
            running: AtomicBool::new(true),
        }
    }

    /// Push a payload into the buffer.
    ///
    /// Returns false when the buffer is stopped, or when it stays full for
    /// the whole backpressure window. On success the record is assigned the
    /// next sequence number and one waiting consumer is woken.
    pub async fn push(&self, topic: &str, payload: Bytes, timestamp_ns: u64) -> bool {
        if !self.is_running() {
            return false;
        }

        let deadline = Instant::now() + PUSH_FULL_WAIT;
        loop {
            {
                let mut inner = self.inner.lock().await;
                if !self.is_running() {
                    return false;
                }
                if inner.queue.len() < self.capacity {
                    let sequence = inner.next_sequence;
                    inner.next_sequence += 1;

                    let message = Arc::new(Message::new(topic, payload, timestamp_ns, sequence));
                    inner.queue.push_back(Arc::clone(&message));
                    inner
                        .topic_queues
                        .entry(message.topic.clone())
                        .or_default()
                        .push_back(message);

                    drop(inner);
                    self.not_empty.notify_one();
                    return true;
                }
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(topic, capacity = self.capacity, "buffer full, dropping push");
                return false;
            }
            if timeout(deadline - now, self.not_full.notified()).await.is_err() {
                warn!(topic, capacity = self.capacity, "buffer full, dropping push");
                return false;
            }
        }
    }

    /// Pop up to `max_batch` records from the head of the buffer.
    ///
    /// Waits up to `wait` for records while the buffer is running and empty.
    /// A stopped buffer still hands out whatever is queued, so the consumer
    /// can drain to completion after shutdown.
    pub async fn pop(&self, max_batch: usize, wait: Duration) -> Vec<MessagePtr> {
        let deadline = Instant::now() + wait;
        loop {
            {
                let mut inner = self.inner.lock().await;
                if !inner.queue.is_empty() {
                    let count = max_batch.min(inner.queue.len());
                    let mut batch = Vec::with_capacity(count);
                    while batch.len() < count {
                        let Some(message) = inner.queue.pop_front() else {
                            break;
                        };
                        Self::unlink_topic_head(&mut inner, &message);
                        batch.push(message);
                    }
                    drop(inner);
                    self.not_full.notify_one();
                    return batch;
                }
            }

            if !self.is_running() {
                return Vec::new();
            }
            let now = Instant::now();
            if now >= deadline {
                return Vec::new();
            }
            if timeout(deadline - now, self.not_empty.notified()).await.is_err() {
                return Vec::new();
            }
        }
    }

    /// Pop up to `max_batch` records for a single topic.
    ///
    /// Unlinking from the global queue is a linear scan; acceptable at the
    /// batch rates this pipeline sustains, but callers on hot paths should
    /// prefer `pop`.
    pub async fn pop_by_topic(&self, topic: &str, max_batch: usize, wait: Duration) -> Vec<MessagePtr> {
        let deadline = Instant::now() + wait;
        loop {
            {
                let mut inner = self.inner.lock().await;
                if let Some(mut topic_queue) = inner.topic_queues.remove(topic) {
                    let count = max_batch.min(topic_queue.len());
                    let mut batch = Vec::with_capacity(count);
                    while batch.len() < count {
                        let Some(message) = topic_queue.pop_front() else {
                            break;
                        };
                        if let Some(pos) = inner
                            .queue
                            .iter()
                            .position(|queued| Arc::ptr_eq(queued, &message))
                        {
                            inner.queue.remove(pos);
                        }
                        batch.push(message);
                    }
                    if !topic_queue.is_empty() {
                        inner.topic_queues.insert(topic.to_string(), topic_queue);
                    }
                    drop(inner);
                    self.not_full.notify_one();
                    return batch;
                }
            }

            if !self.is_running() {
                return Vec::new();
            }
            let now = Instant::now();
            if now >= deadline {
                return Vec::new();
            }
            if timeout(deadline - now, self.not_empty.notified()).await.is_err() {
                return Vec::new();
            }
        }
    }

    /// Number of buffered records.
    pub async fn size(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    /// Number of buffered records for one topic.
    pub async fn topic_size(&self, topic: &str) -> usize {
        self.inner
            .lock()
            .await
            .topic_queues
            .get(topic)
            .map(|q| q.len())
            .unwrap_or(0)
    }

    /// Discard all buffered records and restart sequence numbering at 0.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        let discarded = inner.queue.len();
        inner.queue.clear();
        inner.topic_queues.clear();
        inner.next_sequence = 0;
        drop(inner);
        if discarded > 0 {
            debug!(discarded, "buffer cleared");
        }
        self.not_full.notify_waiters();
    }

    /// Accept pushes again after a `stop`.
    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    /// Refuse new pushes and wake every waiter. Queued records remain
    /// poppable so the consumer can drain them.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn unlink_topic_head(inner: &mut Inner, message: &MessagePtr) {
        if let Some(topic_queue) = inner.topic_queues.get_mut(&message.topic) {
            topic_queue.pop_front();
            if topic_queue.is_empty() {
                inner.topic_queues.remove(&message.topic);
            }
        }
    }
}
