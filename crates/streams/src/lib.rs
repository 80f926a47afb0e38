//! Persistent stream scenarios: publishing, durable queue groups and pull fetching.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod handler;
mod pull;
mod queue;
mod stream;

pub use error::Error;
pub use handler::{ChannelHandler, LoggingHandler, MessageHandler, ReceivedMessage};
pub use pull::{PullOptions, pull_drain};
pub use queue::{QueueSubscribeOptions, QueueSubscription, queue_subscribe};
pub use stream::{
    DEFAULT_STREAM, DEFAULT_SUBJECTS, Published, StreamOptions, ensure_stream, event_payload,
    publish_batch,
};
