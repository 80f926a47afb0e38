use std::error::Error as StdError;

use thiserror::Error;

/// Errors that can occur in the stream scenarios.
#[derive(Debug, Error)]
pub enum Error {
    /// Acknowledgment failed.
    #[error("failed to acknowledge message: {0}")]
    Ack(async_nats::Error),

    /// Fetch request error.
    #[error("failed to request batch: {0}")]
    Batch(async_nats::jetstream::consumer::pull::BatchErrorKind),

    /// Consumer create error.
    #[error("failed to create consumer: {0}")]
    ConsumerCreate(async_nats::jetstream::stream::ConsumerErrorKind),

    /// Consumer delete error.
    #[error("failed to delete consumer: {0}")]
    ConsumerDelete(async_nats::jetstream::stream::ConsumerErrorKind),

    /// Consumer stream error.
    #[error("consumer stream error: {0}")]
    ConsumerStream(async_nats::jetstream::consumer::StreamErrorKind),

    /// A fetched message could not be received.
    #[error("failed to receive message: {0}")]
    Fetch(async_nats::Error),

    /// Handler error.
    #[error("handler error: {0}")]
    Handler(Box<dyn StdError + Send + Sync>),

    /// Push consumer delivery error.
    #[error("failed to receive delivered message: {0}")]
    Messages(async_nats::jetstream::consumer::push::MessagesErrorKind),

    /// Publish error.
    #[error("failed to publish: {0}")]
    Publish(async_nats::jetstream::context::PublishErrorKind),

    /// Stream create error.
    #[error("failed to create stream: {0}")]
    StreamCreate(async_nats::jetstream::context::CreateStreamErrorKind),

    /// Stream lookup error.
    #[error("failed to get stream: {0}")]
    StreamGet(async_nats::jetstream::context::GetStreamErrorKind),

    /// No stream captures the subject.
    #[error("no stream found for subject: {0}")]
    StreamLookup(async_nats::jetstream::context::GetStreamByNameErrorKind),
}
