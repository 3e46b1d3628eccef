pub mod buffer;
pub mod error;
pub mod record;
pub mod time;

pub use buffer::{BufferConfig, MessageBuffer};
pub use error::{Error, Result};
pub use record::{Compression, Message, MessagePtr, TopicInfo, PROTOBUF_ENCODING};
