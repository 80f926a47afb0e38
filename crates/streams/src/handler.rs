use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::info;

/// A message delivered by a consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Subject the message was published on.
    pub subject: String,

    /// Message payload.
    pub payload: Bytes,
}

impl From<&async_nats::jetstream::Message> for ReceivedMessage {
    fn from(message: &async_nats::jetstream::Message) -> Self {
        Self {
            subject: message.subject.to_string(),
            payload: message.payload.clone(),
        }
    }
}

/// Processes messages delivered by a consumer.
///
/// A message is acknowledged only after the handler returns `Ok`.
#[async_trait]
pub trait MessageHandler
where
    Self: Clone + Debug + Send + Sync + 'static,
{
    /// The error type for the handler.
    type Error: StdError + Send + Sync + 'static;

    /// Handles the given message.
    async fn handle(&self, message: ReceivedMessage) -> Result<(), Self::Error>;
}

/// Logs every message and accepts it.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingHandler;

#[async_trait]
impl MessageHandler for LoggingHandler {
    type Error = Infallible;

    async fn handle(&self, message: ReceivedMessage) -> Result<(), Self::Error> {
        info!(
            subject = %message.subject,
            payload = %String::from_utf8_lossy(&message.payload),
            "received message"
        );
        Ok(())
    }
}

/// Forwards every message into a channel.
///
/// Fails (leaving the message unacknowledged) once the receiver is gone.
#[derive(Clone, Debug)]
pub struct ChannelHandler {
    sender: mpsc::Sender<ReceivedMessage>,
}

impl ChannelHandler {
    /// Creates a handler and the receiving end of its channel.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ReceivedMessage>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl MessageHandler for ChannelHandler {
    type Error = mpsc::error::SendError<ReceivedMessage>;

    async fn handle(&self, message: ReceivedMessage) -> Result<(), Self::Error> {
        self.sender.send(message).await
    }
}
