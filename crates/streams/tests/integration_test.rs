//! Stream scenarios against a live NATS server with `JetStream` enabled.
//!
//! Point `NATS_TEST_URL` at the server and run with `--ignored`.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_nats::jetstream::Context as JetStreamContext;
use async_trait::async_trait;
use nats_client_connect::{NatsConnectOptions, connect, jetstream};
use nats_client_streams::{
    ChannelHandler, Error, LoggingHandler, MessageHandler, PullOptions, QueueSubscribeOptions,
    ReceivedMessage, StreamOptions, ensure_stream, event_payload, publish_batch, pull_drain,
    queue_subscribe,
};
use tokio::time::timeout;
use uuid::Uuid;

async fn get_test_js_context(prefix: &str) -> (JetStreamContext, StreamOptions) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let options = NatsConnectOptions::from_env("NATS_TEST_URL").with_name("nats-client-test");
    let client = connect(&options)
        .await
        .expect("Failed to connect to NATS for tests");

    let id = Uuid::new_v4().simple().to_string();
    let stream_options = StreamOptions {
        name: format!("TEST_{prefix}_{id}"),
        subjects: vec![format!("test_{prefix}_{id}.>")],
        persist: false,
    };

    let context = jetstream(client, None);
    ensure_stream(&context, &stream_options)
        .await
        .expect("Failed to create stream");

    (context, stream_options)
}

fn subject(options: &StreamOptions, token: &str) -> String {
    options.subjects[0].replace('>', token)
}

/// Rejects every message.
#[derive(Clone, Debug)]
struct RejectingHandler;

#[async_trait]
impl MessageHandler for RejectingHandler {
    type Error = io::Error;

    async fn handle(&self, _message: ReceivedMessage) -> Result<(), Self::Error> {
        Err(io::Error::other("rejected"))
    }
}

/// Rejects the first delivery, then forwards everything to `inner`.
#[derive(Clone, Debug)]
struct FailOnceHandler {
    attempts: Arc<AtomicUsize>,
    inner: ChannelHandler,
}

#[async_trait]
impl MessageHandler for FailOnceHandler {
    type Error = io::Error;

    async fn handle(&self, message: ReceivedMessage) -> Result<(), Self::Error> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(io::Error::other("first delivery rejected"));
        }
        self.inner
            .handle(message)
            .await
            .map_err(|_| io::Error::other("receiver gone"))
    }
}

#[tokio::test]
#[ignore] // Requires a running NATS server
async fn test_publish_assigns_increasing_sequences() {
    let (context, options) = get_test_js_context("publish").await;

    let published = publish_batch(&context, &subject(&options, "new"), 3)
        .await
        .expect("Failed to publish");

    assert_eq!(published.len(), 3);
    assert!(published.iter().all(|p| p.stream == options.name));
    assert_eq!(
        published.iter().map(|p| p.sequence).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    context.delete_stream(&options.name).await.ok();
}

#[tokio::test]
#[ignore] // Requires a running NATS server
async fn test_publish_without_stream_fails() {
    let (context, options) = get_test_js_context("nostream").await;

    let result = publish_batch(&context, &format!("nowhere_{}", Uuid::new_v4().simple()), 1).await;

    assert!(matches!(result, Err(Error::Publish(_))));

    context.delete_stream(&options.name).await.ok();
}

#[tokio::test]
#[ignore] // Requires a running NATS server
async fn test_queue_subscribe_receives_single_message() {
    let (context, options) = get_test_js_context("queue1").await;
    let filter = options.subjects[0].clone();
    let (handler, mut receiver) = ChannelHandler::new(16);

    let subscription = queue_subscribe(
        &context,
        &QueueSubscribeOptions::new(&filter, "event-processor", "queue-durable"),
        handler,
    )
    .await
    .expect("Failed to subscribe");

    publish_batch(&context, &subject(&options, "new"), 1)
        .await
        .expect("Failed to publish");

    let message = timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("message should arrive")
        .expect("channel open");
    assert_eq!(message.subject, subject(&options, "new"));
    assert_eq!(message.payload, event_payload(1));

    subscription.delete().await.expect("Failed to delete consumer");
    context.delete_stream(&options.name).await.ok();
}

#[tokio::test]
#[ignore] // Requires a running NATS server
async fn test_queue_group_members_split_deliveries() {
    let (context, options) = get_test_js_context("queue5").await;
    let filter = options.subjects[0].clone();
    let queue_options = QueueSubscribeOptions::new(&filter, "event-processor", "queue-durable");
    let (handler, mut receiver) = ChannelHandler::new(16);

    let first = queue_subscribe(&context, &queue_options, handler.clone())
        .await
        .expect("Failed to subscribe");
    let second = queue_subscribe(&context, &queue_options, handler)
        .await
        .expect("Failed to join the group");

    publish_batch(&context, &subject(&options, "new"), 5)
        .await
        .expect("Failed to publish");

    let mut payloads = Vec::new();
    for _ in 0..5 {
        let message = timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("message should arrive")
            .expect("channel open");
        payloads.push(message.payload);
    }
    payloads.sort();
    let mut expected: Vec<_> = (1..=5).map(event_payload).collect();
    expected.sort();
    assert_eq!(payloads, expected);

    // Each message went to exactly one member.
    assert!(
        timeout(Duration::from_millis(500), receiver.recv())
            .await
            .is_err()
    );

    first.unsubscribe();
    second.delete().await.expect("Failed to delete consumer");
    context.delete_stream(&options.name).await.ok();
}

#[tokio::test]
#[ignore] // Requires a running NATS server
async fn test_pull_drain_handles_everything_then_stops() {
    let (context, options) = get_test_js_context("pull").await;
    let filter = options.subjects[0].clone();

    publish_batch(&context, &subject(&options, "new"), 7)
        .await
        .expect("Failed to publish");

    let pull_options = PullOptions {
        max_wait: Duration::from_millis(500),
        ..PullOptions::new(&filter, "pull-durable")
    };

    let handled = pull_drain(&context, &pull_options, &LoggingHandler)
        .await
        .expect("Failed to drain");
    assert_eq!(handled, 7);

    // Everything was acked, so a second drain finds nothing.
    let handled = pull_drain(&context, &pull_options, &LoggingHandler)
        .await
        .expect("Failed to drain");
    assert_eq!(handled, 0);

    context.delete_stream(&options.name).await.ok();
}

#[tokio::test]
#[ignore] // Requires a running NATS server
async fn test_pull_drain_waits_for_late_messages() {
    let (context, options) = get_test_js_context("pullwait").await;
    let filter = options.subjects[0].clone();
    let pull_options = PullOptions {
        max_wait: Duration::from_secs(2),
        ..PullOptions::new(&filter, "pull-durable")
    };

    let publisher_context = context.clone();
    let late_subject = subject(&options, "late");
    let publisher = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        publish_batch(&publisher_context, &late_subject, 1).await
    });

    let handled = pull_drain(&context, &pull_options, &LoggingHandler)
        .await
        .expect("Failed to drain");

    publisher
        .await
        .expect("publisher panicked")
        .expect("Failed to publish");
    assert_eq!(handled, 1);

    context.delete_stream(&options.name).await.ok();
}

#[tokio::test]
#[ignore] // Requires a running NATS server
async fn test_pull_drain_stops_on_handler_failure_and_redelivers() {
    let (context, options) = get_test_js_context("pullfail").await;
    let filter = options.subjects[0].clone();

    publish_batch(&context, &subject(&options, "new"), 1)
        .await
        .expect("Failed to publish");

    let pull_options = PullOptions {
        max_wait: Duration::from_millis(500),
        ..PullOptions::new(&filter, "pull-durable")
    };

    let result = pull_drain(&context, &pull_options, &RejectingHandler).await;
    assert!(matches!(result, Err(Error::Handler(_))));

    let (handler, mut receiver) = ChannelHandler::new(4);
    let handled = pull_drain(&context, &pull_options, &handler)
        .await
        .expect("Failed to drain");
    assert_eq!(handled, 1);
    assert_eq!(
        receiver.recv().await.map(|m| m.payload),
        Some(event_payload(1))
    );

    context.delete_stream(&options.name).await.ok();
}

#[tokio::test]
#[ignore] // Requires a running NATS server
async fn test_queue_subscribe_redelivers_rejected_message() {
    let (context, options) = get_test_js_context("queuefail").await;
    let filter = options.subjects[0].clone();
    let (inner, mut receiver) = ChannelHandler::new(4);
    let attempts = Arc::new(AtomicUsize::new(0));
    let handler = FailOnceHandler {
        attempts: attempts.clone(),
        inner,
    };

    let subscription = queue_subscribe(
        &context,
        &QueueSubscribeOptions::new(&filter, "event-processor", "queue-durable"),
        handler,
    )
    .await
    .expect("Failed to subscribe");

    publish_batch(&context, &subject(&options, "new"), 1)
        .await
        .expect("Failed to publish");

    let message = timeout(Duration::from_secs(5), receiver.recv())
        .await
        .expect("rejected message should be redelivered")
        .expect("channel open");
    assert_eq!(message.payload, event_payload(1));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);

    subscription.delete().await.expect("Failed to delete consumer");
    context.delete_stream(&options.name).await.ok();
}
