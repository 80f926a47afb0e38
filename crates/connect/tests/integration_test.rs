//! Live checks against a NATS server with `JetStream` enabled.
//!
//! Point `NATS_TEST_URL` at the server and run with `--ignored`.

use nats_client_connect::{NatsConnectOptions, connect, is_connected, jetstream, shutdown};

fn test_options() -> NatsConnectOptions {
    NatsConnectOptions::from_env("NATS_TEST_URL").with_name("nats-client-test")
}

#[tokio::test]
#[ignore] // Requires a running NATS server
async fn test_connection_is_live() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let client = connect(&test_options()).await.expect("Failed to connect");

    assert!(is_connected(&client), "client should report a live connection");

    shutdown(client).await.expect("Failed to flush");
}

#[tokio::test]
#[ignore] // Requires a running NATS server
async fn test_jetstream_context_for_default_account() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let client = connect(&test_options()).await.expect("Failed to connect");
    let context = jetstream(client, None);

    context
        .query_account()
        .await
        .expect("JetStream should be enabled on the test server");
}

#[tokio::test]
#[ignore] // Requires a running NATS server
async fn test_unknown_domain_fails_on_first_use() {
    let client = connect(&test_options()).await.expect("Failed to connect");
    let context = jetstream(client, Some("invalid-domain"));

    assert!(context.query_account().await.is_err());
}
