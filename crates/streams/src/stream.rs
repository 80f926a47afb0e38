use async_nats::jetstream::Context as JetStreamContext;
use async_nats::jetstream::stream::{Config, StorageType, Stream};
use bytes::Bytes;
use tracing::info;

use crate::Error;

/// Stream used by the scenarios unless told otherwise.
pub const DEFAULT_STREAM: &str = "EVENTS";

/// Subjects captured by [`DEFAULT_STREAM`].
pub const DEFAULT_SUBJECTS: &[&str] = &["events.>"];

/// Options for the persistent stream.
#[derive(Clone, Debug)]
pub struct StreamOptions {
    /// Stream name.
    pub name: String,

    /// Subjects captured by the stream.
    pub subjects: Vec<String>,

    /// Whether messages are stored on disk rather than in memory.
    pub persist: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_STREAM.to_string(),
            subjects: DEFAULT_SUBJECTS.iter().map(ToString::to_string).collect(),
            persist: true,
        }
    }
}

/// Gets the stream, creating it if it does not exist yet.
///
/// # Errors
///
/// Returns `Error::StreamCreate` if the stream cannot be created, for instance
/// because its subjects overlap another stream.
pub async fn ensure_stream(
    context: &JetStreamContext,
    options: &StreamOptions,
) -> Result<Stream, Error> {
    let stream = context
        .get_or_create_stream(Config {
            name: options.name.clone(),
            subjects: options.subjects.clone(),
            storage: if options.persist {
                StorageType::File
            } else {
                StorageType::Memory
            },
            ..Default::default()
        })
        .await
        .map_err(|e| Error::StreamCreate(e.kind()))?;

    info!(stream = %options.name, subjects = ?options.subjects, "stream ready");
    Ok(stream)
}

/// JSON payload of event number `n`.
#[must_use]
pub fn event_payload(n: usize) -> Bytes {
    Bytes::from(serde_json::json!({ "msg": format!("message #{n}") }).to_string())
}

/// Acknowledgement of a persisted message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    /// Stream that stored the message.
    pub stream: String,

    /// Sequence assigned by the stream.
    pub sequence: u64,
}

/// Publishes `count` events to `subject` and waits for each to be persisted.
///
/// # Errors
///
/// Returns `Error::Publish` if a message is not acknowledged, e.g. because no
/// stream captures `subject`.
pub async fn publish_batch(
    context: &JetStreamContext,
    subject: &str,
    count: usize,
) -> Result<Vec<Published>, Error> {
    let mut published = Vec::with_capacity(count);

    for n in 1..=count {
        let ack = context
            .publish(subject.to_string(), event_payload(n))
            .await
            .map_err(|e| Error::Publish(e.kind()))?
            .await
            .map_err(|e| Error::Publish(e.kind()))?;

        info!(stream = %ack.stream, sequence = ack.sequence, subject, "published message");
        published.push(Published {
            stream: ack.stream,
            sequence: ack.sequence,
        });
    }

    Ok(published)
}
