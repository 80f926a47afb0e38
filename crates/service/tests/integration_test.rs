//! Service scenarios against a live NATS server.
//!
//! Point `NATS_TEST_URL` at the server and run with `--ignored`.

use async_nats::Client;
use bytes::Bytes;
use nats_client_connect::{NatsConnectOptions, connect};
use nats_client_service::{ServiceDefinition, start};
use uuid::Uuid;

async fn get_test_client() -> Client {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let options = NatsConnectOptions::from_env("NATS_TEST_URL").with_name("nats-client-test");
    connect(&options)
        .await
        .expect("Failed to connect to NATS for tests")
}

/// The user service on subjects unique to this test run.
fn isolated_user_service() -> ServiceDefinition {
    let prefix = format!("test_{}", Uuid::new_v4().simple());
    let mut definition = ServiceDefinition::user_service();
    for endpoint in &mut definition.endpoints {
        endpoint.subject = format!("{prefix}.{}", endpoint.subject);
    }
    definition
}

#[tokio::test]
#[ignore] // Requires a running NATS server
async fn test_echo_endpoints_reply_with_payload() {
    let client = get_test_client().await;
    let definition = isolated_user_service();
    let subjects: Vec<_> = definition.endpoints[1..]
        .iter()
        .map(|e| e.subject.clone())
        .collect();

    let service = start(&client, definition)
        .await
        .expect("Failed to start service");

    for subject in subjects {
        let reply = client
            .request(subject.clone(), Bytes::from("alice"))
            .await
            .expect("Failed to request");
        assert_eq!(reply.payload, Bytes::from("alice"), "{subject}");
    }

    service.stop().await.expect("Failed to stop service");
}

#[tokio::test]
#[ignore] // Requires a running NATS server
async fn test_login_replies_with_service_error() {
    let client = get_test_client().await;
    let definition = isolated_user_service();
    let login = definition.endpoints[0].subject.clone();

    let service = start(&client, definition)
        .await
        .expect("Failed to start service");

    let reply = client
        .request(login, Bytes::from("alice"))
        .await
        .expect("Failed to request");
    let headers = reply.headers.expect("error reply carries headers");

    assert_eq!(
        headers.get("Nats-Service-Error-Code").map(|v| v.as_str()),
        Some("400")
    );
    assert_eq!(
        headers.get("Nats-Service-Error").map(|v| v.as_str()),
        Some("Bad Request")
    );

    service.stop().await.expect("Failed to stop service");
}

#[tokio::test]
#[ignore] // Requires a running NATS server
async fn test_service_answers_discovery_ping() {
    let client = get_test_client().await;
    let service = start(&client, isolated_user_service())
        .await
        .expect("Failed to start service");

    let reply = client
        .request("$SRV.PING.UserSV", Bytes::new())
        .await
        .expect("service should answer ping");
    let ping: serde_json::Value =
        serde_json::from_slice(&reply.payload).expect("ping reply is json");

    assert_eq!(ping["name"], "UserSV");
    assert_eq!(ping["version"], "1.0.0");

    service.stop().await.expect("Failed to stop service");
}
