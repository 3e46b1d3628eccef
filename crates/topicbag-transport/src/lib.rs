//! Transport Abstraction
//!
//! The recorder and player never talk to a concrete messaging bus. They bind
//! to the byte-level capability set only — publish bytes, subscribe to
//! bytes — through the [`Transport`] factory trait. A bus integration
//! implements the three traits here; the pipeline stays ignorant of
//! discovery, QoS, and wire protocol, and the bus's type system never leaks
//! into the buffer or the writer.
//!
//! [`memory::MemoryTransport`] is the bundled in-process implementation,
//! used by the integration tests and by embedders that want record/replay
//! without an external bus.

pub mod error;
pub mod memory;

pub use error::{Result, TransportError};
pub use memory::MemoryTransport;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Handler invoked with every payload delivered to a subscription.
pub type PayloadHandler = Arc<dyn Fn(Bytes) -> BoxFuture<'static, ()> + Send + Sync>;

/// Publishing side of one topic.
#[async_trait]
pub trait BusPublisher: Send + Sync {
    fn topic(&self) -> &str;

    /// Publish raw payload bytes. Returns false when the bus refuses or
    /// nothing is listening; the caller decides whether that matters.
    async fn publish(&self, payload: Bytes) -> bool;
}

/// Subscribing side of one topic. Dropping the subscriber tears down
/// delivery; no handler call starts after the drop.
pub trait BusSubscriber: Send + Sync {
    fn topic(&self) -> &str;
}

/// Factory for publishers and subscribers over an external bus.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn create_publisher(&self, topic: &str) -> Result<Arc<dyn BusPublisher>>;

    async fn create_subscriber(
        &self,
        topic: &str,
        handler: PayloadHandler,
    ) -> Result<Box<dyn BusSubscriber>>;
}
