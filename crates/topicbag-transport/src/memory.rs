//! In-Process Bus
//!
//! `MemoryTransport` implements the transport traits over
//! `tokio::sync::broadcast`: one sender per topic, created lazily on first
//! use by either side. Each subscriber runs a forwarding task that feeds the
//! payload handler; dropping the subscriber aborts the task, so no handler
//! call starts afterwards.
//!
//! `publish` reports false when no subscriber is listening, which is the
//! only failure an in-process bus has.

use crate::{BusPublisher, BusSubscriber, PayloadHandler, Result, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Buffered payloads per topic before a slow subscriber starts lagging.
const TOPIC_CHANNEL_CAPACITY: usize = 1024;

/// Process-local topic bus.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    topics: Arc<Mutex<HashMap<String, broadcast::Sender<Bytes>>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender_for(&self, topic: &str) -> broadcast::Sender<Bytes> {
        let mut topics = self.topics.lock().await;
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn create_publisher(&self, topic: &str) -> Result<Arc<dyn BusPublisher>> {
        let sender = self.sender_for(topic).await;
        Ok(Arc::new(MemoryPublisher {
            topic: topic.to_string(),
            sender,
        }))
    }

    async fn create_subscriber(
        &self,
        topic: &str,
        handler: PayloadHandler,
    ) -> Result<Box<dyn BusSubscriber>> {
        let mut receiver = self.sender_for(topic).await.subscribe();
        let topic_name = topic.to_string();
        let task_topic = topic_name.clone();

        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(payload) => handler(payload).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(topic = %task_topic, skipped, "subscriber lagged, payloads missed");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        debug!(topic = %topic_name, "memory subscriber created");
        Ok(Box::new(MemorySubscriber {
            topic: topic_name,
            task,
        }))
    }
}

struct MemoryPublisher {
    topic: String,
    sender: broadcast::Sender<Bytes>,
}

#[async_trait]
impl BusPublisher for MemoryPublisher {
    fn topic(&self) -> &str {
        &self.topic
    }

    async fn publish(&self, payload: Bytes) -> bool {
        self.sender.send(payload).is_ok()
    }
}

struct MemorySubscriber {
    topic: String,
    task: JoinHandle<()>,
}

impl BusSubscriber for MemorySubscriber {
    fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for MemorySubscriber {
    fn drop(&mut self) {
        self.task.abort();
    }
}
