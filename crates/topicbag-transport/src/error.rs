use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to create publisher for {topic}: {reason}")]
    PublisherCreate { topic: String, reason: String },

    #[error("Failed to create subscriber for {topic}: {reason}")]
    SubscriberCreate { topic: String, reason: String },
}
