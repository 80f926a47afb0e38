use async_nats::jetstream::{AckKind, Context as JetStreamContext};
use async_nats::jetstream::consumer::push::Config as PushConfig;
use async_nats::jetstream::consumer::{AckPolicy, Consumer};
use async_nats::jetstream::stream::Stream;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{Error, MessageHandler, ReceivedMessage};

/// Options for a durable queue-group subscription.
#[derive(Clone, Debug)]
pub struct QueueSubscribeOptions {
    /// Subject filter, e.g. `events.>`.
    pub subject: String,

    /// Queue group. Members share the deliveries of the subscription.
    pub queue: String,

    /// Durable consumer name. Survives restarts of the subscriber.
    pub durable: String,
}

impl QueueSubscribeOptions {
    /// Options for `subject` with the given queue group and durable name.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        queue: impl Into<String>,
        durable: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            queue: queue.into(),
            durable: durable.into(),
        }
    }

    /// Delivery subject shared by every member of the group.
    #[must_use]
    pub fn deliver_subject(&self) -> String {
        format!("_QUEUE_DELIVER.{}", self.durable)
    }

    fn config(&self) -> PushConfig {
        PushConfig {
            durable_name: Some(self.durable.clone()),
            deliver_subject: self.deliver_subject(),
            deliver_group: Some(self.queue.clone()),
            filter_subject: self.subject.clone(),
            ack_policy: AckPolicy::Explicit,
            ..Default::default()
        }
    }
}

/// A running queue-group subscription.
///
/// Dropping the value leaves the delivery task running; call
/// [`QueueSubscription::unsubscribe`] or [`QueueSubscription::delete`].
#[derive(Debug)]
pub struct QueueSubscription {
    durable: String,
    stream: Stream,
    task: JoinHandle<Result<(), Error>>,
}

impl QueueSubscription {
    /// Durable consumer name.
    #[must_use]
    pub fn durable(&self) -> &str {
        &self.durable
    }

    /// Stops receiving. The durable consumer keeps its position on the server.
    pub fn unsubscribe(self) {
        self.task.abort();
        info!(durable = %self.durable, "unsubscribed");
    }

    /// Stops receiving and deletes the durable consumer.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConsumerDelete` if the server cannot delete the consumer.
    pub async fn delete(self) -> Result<(), Error> {
        self.task.abort();
        self.stream
            .delete_consumer(&self.durable)
            .await
            .map_err(|e| Error::ConsumerDelete(e.kind()))?;

        info!(durable = %self.durable, "deleted consumer");
        Ok(())
    }
}

/// Finds the stream capturing `subject`.
pub(crate) async fn stream_for_subject(
    context: &JetStreamContext,
    subject: &str,
) -> Result<Stream, Error> {
    let name = context
        .stream_by_subject(subject)
        .await
        .map_err(|e| Error::StreamLookup(e.kind()))?;

    context
        .get_stream(name)
        .await
        .map_err(|e| Error::StreamGet(e.kind()))
}

async fn process_messages<X>(consumer: Consumer<PushConfig>, handler: X) -> Result<(), Error>
where
    X: MessageHandler,
{
    let mut messages = consumer
        .messages()
        .await
        .map_err(|e| Error::ConsumerStream(e.kind()))?;

    while let Some(message) = messages.next().await {
        let message = message.map_err(|e| Error::Messages(e.kind()))?;

        if let Err(e) = handler.handle(ReceivedMessage::from(&message)).await {
            warn!(subject = %message.subject, "handler failed: {e}");
            // Nak so the server redelivers it without waiting for the ack timeout.
            if let Err(e) = message.ack_with(AckKind::Nak(None)).await {
                error!(subject = %message.subject, "failed to nak: {e}");
            }
            continue;
        }

        if let Err(e) = message.ack().await {
            error!(subject = %message.subject, "failed to ack: {e}");
        } else {
            debug!(subject = %message.subject, "acked message");
        }
    }

    Ok(())
}

/// Joins the queue group on a durable push consumer and hands every delivery
/// to `handler`, acknowledging it once the handler succeeds. Rejected messages
/// are negatively acknowledged and redelivered.
///
/// Calling this again with the same options joins the same consumer.
///
/// # Errors
///
/// Returns `Error::StreamLookup` if no stream captures the subject and
/// `Error::ConsumerCreate` if the consumer cannot be created.
pub async fn queue_subscribe<X>(
    context: &JetStreamContext,
    options: &QueueSubscribeOptions,
    handler: X,
) -> Result<QueueSubscription, Error>
where
    X: MessageHandler,
{
    let stream = stream_for_subject(context, &options.subject).await?;

    let consumer: Consumer<PushConfig> = stream
        .get_or_create_consumer(&options.durable, options.config())
        .await
        .map_err(|e| Error::ConsumerCreate(e.kind()))?;

    let durable = options.durable.clone();
    let task = tokio::spawn(async move {
        let result = process_messages(consumer, handler).await;
        if let Err(e) = &result {
            error!(durable = %durable, "queue subscription ended: {e}");
        }
        result
    });

    info!(
        subject = %options.subject,
        queue = %options.queue,
        durable = %options.durable,
        "joined queue group"
    );

    Ok(QueueSubscription {
        durable: options.durable.clone(),
        stream,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_members_share_a_delivery_subject() {
        let a = QueueSubscribeOptions::new("events.>", "event-processor", "my-durable");
        let b = QueueSubscribeOptions::new("events.>", "event-processor", "my-durable");

        assert_eq!(a.deliver_subject(), b.deliver_subject());
        assert_eq!(a.deliver_subject(), "_QUEUE_DELIVER.my-durable");
    }

    #[test]
    fn push_config_is_durable_and_grouped() {
        let config = QueueSubscribeOptions::new("events.>", "event-processor", "my-durable").config();

        assert_eq!(config.durable_name.as_deref(), Some("my-durable"));
        assert_eq!(config.deliver_group.as_deref(), Some("event-processor"));
        assert_eq!(config.filter_subject, "events.>");
        assert_eq!(config.ack_policy, AckPolicy::Explicit);
    }
}
