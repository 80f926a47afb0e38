//! Connection and `JetStream` context setup shared by the NATS client scenarios.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::time::Duration;

use async_nats::connection::State;
use async_nats::jetstream::{self, Context as JetStreamContext};
use async_nats::{Client, ConnectOptions, Event};
use tracing::{debug, info, warn};

/// Server used when no URL is configured.
pub const DEFAULT_URL: &str = "nats://localhost:4222";

/// Name the client announces to the server.
pub const DEFAULT_CLIENT_NAME: &str = "nats-client";

/// `JetStream` domain the scenarios run against.
pub const DEFAULT_DOMAIN: &str = "hub";

/// Options for connecting to a NATS server.
#[derive(Clone, Debug)]
pub struct NatsConnectOptions {
    /// Server URL, e.g. `nats://localhost:4222`.
    pub url: String,

    /// Client name reported to the server.
    pub name: String,

    /// `JetStream` domain. `None` (or an empty string) selects the local account's `JetStream`.
    pub domain: Option<String>,

    /// How long to wait for the initial connection.
    pub connection_timeout: Duration,
}

impl Default for NatsConnectOptions {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            name: DEFAULT_CLIENT_NAME.to_string(),
            domain: Some(DEFAULT_DOMAIN.to_string()),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl NatsConnectOptions {
    /// Default options with the URL taken from the environment variable `var`.
    ///
    /// Falls back to [`DEFAULT_URL`] when the variable is unset or empty.
    #[must_use]
    pub fn from_env(var: &str) -> Self {
        let url = std::env::var(var)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_URL.to_string());

        Self {
            url,
            ..Self::default()
        }
    }

    /// Replaces the client name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the `JetStream` domain.
    #[must_use]
    pub fn with_domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }
}

/// Connects to the server described by `options`.
///
/// Connection state changes are reported through `tracing`.
///
/// # Errors
///
/// Returns `Error::Connect` if the server cannot be reached.
pub async fn connect(options: &NatsConnectOptions) -> Result<Client, Error> {
    let client = ConnectOptions::new()
        .name(&options.name)
        .connection_timeout(options.connection_timeout)
        .event_callback(|event| async move {
            match event {
                Event::Connected => info!("[NATS] connected"),
                Event::Disconnected => warn!("[NATS] disconnected"),
                other => debug!(event = ?other, "[NATS] connection event"),
            }
        })
        .connect(options.url.as_str())
        .await
        .map_err(|e| Error::Connect(e.kind()))?;

    info!(url = %options.url, name = %options.name, "NATS client ready");

    Ok(client)
}

/// Whether the client currently holds a live connection.
#[must_use]
pub fn is_connected(client: &Client) -> bool {
    matches!(client.connection_state(), State::Connected)
}

/// Creates a `JetStream` context, bound to `domain` when one is given.
#[must_use]
pub fn jetstream(client: Client, domain: Option<&str>) -> JetStreamContext {
    match domain.filter(|domain| !domain.is_empty()) {
        Some(domain) => {
            debug!(domain, "using JetStream domain");
            jetstream::with_domain(client, domain)
        }
        None => jetstream::new(client),
    }
}

/// Flushes anything still buffered before the client is dropped.
///
/// # Errors
///
/// Returns `Error::Flush` if the connection is gone.
pub async fn shutdown(client: Client) -> Result<(), Error> {
    client.flush().await.map_err(|e| Error::Flush(e.kind()))?;
    debug!("NATS client flushed");
    Ok(())
}
