use std::time::Duration;

use async_nats::jetstream::{AckKind, Context as JetStreamContext};
use async_nats::jetstream::consumer::pull::Config as PullConfig;
use async_nats::jetstream::consumer::{AckPolicy, Consumer};
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::queue::stream_for_subject;
use crate::{Error, MessageHandler, ReceivedMessage};

/// Options for draining a durable pull consumer.
#[derive(Clone, Debug)]
pub struct PullOptions {
    /// Subject filter.
    pub subject: String,

    /// Durable consumer name.
    pub durable: String,

    /// Messages requested per fetch.
    pub batch: usize,

    /// How long the server may hold a fetch open waiting for messages.
    pub max_wait: Duration,
}

impl PullOptions {
    /// Options with a batch of 3 and a 2 second wait.
    #[must_use]
    pub fn new(subject: impl Into<String>, durable: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            durable: durable.into(),
            batch: 3,
            max_wait: Duration::from_secs(2),
        }
    }

    fn config(&self) -> PullConfig {
        PullConfig {
            durable_name: Some(self.durable.clone()),
            filter_subject: self.subject.clone(),
            ack_policy: AckPolicy::Explicit,
            ..Default::default()
        }
    }
}

/// Fetches batches from the durable pull consumer until one comes back empty,
/// acknowledging each message after `handler` accepts it.
///
/// Returns the number of messages handled.
///
/// # Errors
///
/// Returns `Error::Handler` as soon as the handler rejects a message; that
/// message is negatively acknowledged so the next drain receives it again.
/// Lookup, fetch and ack failures are returned as their own variants.
pub async fn pull_drain<X>(
    context: &JetStreamContext,
    options: &PullOptions,
    handler: &X,
) -> Result<usize, Error>
where
    X: MessageHandler,
{
    let stream = stream_for_subject(context, &options.subject).await?;
    let consumer: Consumer<PullConfig> = stream
        .get_or_create_consumer(&options.durable, options.config())
        .await
        .map_err(|e| Error::ConsumerCreate(e.kind()))?;

    let mut handled = 0;
    loop {
        // Waits up to `max_wait` for the first message instead of returning at once.
        let mut batch = consumer
            .batch()
            .max_messages(options.batch)
            .expires(options.max_wait)
            .messages()
            .await
            .map_err(|e| Error::Batch(e.kind()))?;

        let mut in_batch = 0;
        while let Some(message) = batch.next().await {
            let message = message.map_err(Error::Fetch)?;
            in_batch += 1;

            if let Err(e) = handler.handle(ReceivedMessage::from(&message)).await {
                if let Err(nak_error) = message.ack_with(AckKind::Nak(None)).await {
                    warn!(subject = %message.subject, "failed to nak: {nak_error}");
                }
                return Err(Error::Handler(Box::new(e)));
            }
            message.ack().await.map_err(Error::Ack)?;
        }

        debug!(durable = %options.durable, messages = in_batch, "fetched batch");
        if in_batch == 0 {
            break;
        }
        handled += in_batch;
    }

    info!(durable = %options.durable, handled, "pull consumer drained");
    Ok(handled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fetch_three_with_two_second_wait() {
        let options = PullOptions::new("events.>", "pull-durable");

        assert_eq!(options.batch, 3);
        assert_eq!(options.max_wait, Duration::from_secs(2));

        let config = options.config();
        assert_eq!(config.durable_name.as_deref(), Some("pull-durable"));
        assert_eq!(config.filter_subject, "events.>");
    }
}
