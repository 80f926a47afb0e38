//! Command line front end running the NATS client scenarios.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nats_client_connect::{DEFAULT_CLIENT_NAME, DEFAULT_DOMAIN, DEFAULT_URL, NatsConnectOptions};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connection error
    #[error(transparent)]
    Connect(#[from] nats_client_connect::Error),

    /// Key-value error
    #[error(transparent)]
    Kv(#[from] nats_client_kv::Error),

    /// Object store error
    #[error(transparent)]
    ObjectStore(#[from] nats_client_object_store::Error),

    /// Service error
    #[error(transparent)]
    Service(#[from] nats_client_service::Error),

    /// Stream error
    #[error(transparent)]
    Streams(#[from] nats_client_streams::Error),
}

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// NATS server URL
    #[arg(long, default_value = DEFAULT_URL, env = "NATS_URL")]
    url: String,

    /// Client name reported to the server
    #[arg(long, default_value = DEFAULT_CLIENT_NAME, env = "NATS_CLIENT_NAME")]
    name: String,

    /// JetStream domain. Empty for the default domain
    #[arg(long, default_value = DEFAULT_DOMAIN, env = "NATS_DOMAIN")]
    domain: String,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    fn connect_options(&self) -> NatsConnectOptions {
        NatsConnectOptions {
            url: self.url.clone(),
            ..NatsConnectOptions::default()
        }
        .with_name(&self.name)
        .with_domain(Some(self.domain.clone()).filter(|domain| !domain.is_empty()))
    }
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// Create a key and update it with optimistic revisions
    KvUpdate {
        /// Bucket name
        #[arg(long, default_value = nats_client_kv::DEFAULT_BUCKET)]
        bucket: String,

        /// Key to update
        #[arg(long, default_value = "key1")]
        key: String,

        /// Number of updates
        #[arg(long, default_value_t = 10)]
        count: usize,

        /// Milliseconds between updates
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },

    /// Watch every key of a bucket
    KvWatch {
        /// Bucket name
        #[arg(long, default_value = nats_client_kv::DEFAULT_BUCKET)]
        bucket: String,

        /// Only report changes made after the watch starts, skipping the
        /// current value of every key
        #[arg(long)]
        updates_only: bool,

        /// Stop once this key is set to `--stop-value`
        #[arg(long, default_value = "foo")]
        stop_key: String,

        /// Value that ends the watch
        #[arg(long, default_value = "baz")]
        stop_value: String,
    },

    /// Upload a file to the object store
    ObjectPut {
        /// File to upload
        file: PathBuf,

        /// Bucket name
        #[arg(long, default_value = nats_client_object_store::DEFAULT_BUCKET)]
        bucket: String,

        /// Replicas for a newly created bucket
        #[arg(long, default_value_t = 2)]
        replicas: usize,

        /// Object name. Defaults to the file name
        #[arg(long)]
        object_name: Option<String>,

        /// Object description
        #[arg(long)]
        description: Option<String>,

        /// Metadata pairs as `key=value`
        #[arg(long = "meta", value_parser = commands::parse_key_value)]
        metadata: Vec<(String, String)>,
    },

    /// Download an object into a local file
    ObjectGet {
        /// Object name
        name: String,

        /// Destination path
        dest: PathBuf,

        /// Bucket name
        #[arg(long, default_value = nats_client_object_store::DEFAULT_BUCKET)]
        bucket: String,
    },

    /// Publish JSON events to the persistent stream
    StreamPub {
        /// Subjects to publish to
        #[arg(
            long = "subject",
            default_values_t = [
                "events.user.1".to_string(),
                "events.user.2".to_string(),
                "events.admin.2".to_string(),
            ]
        )]
        subjects: Vec<String>,

        /// Messages per subject
        #[arg(long, default_value_t = 3)]
        count: usize,
    },

    /// Join a durable queue group until interrupted
    StreamQueueSub {
        /// Subject filter
        #[arg(long, default_value = "events.user.*")]
        subject: String,

        /// Queue group
        #[arg(long, default_value = "my_consumer")]
        queue: String,

        /// Durable consumer name
        #[arg(long, default_value = "worker-group")]
        durable: String,
    },

    /// Drain a durable pull consumer
    StreamPullSub {
        /// Subject filter
        #[arg(long, default_value = "events.*")]
        subject: String,

        /// Durable consumer name
        #[arg(long, default_value = "my_consumer")]
        durable: String,

        /// Messages per fetch
        #[arg(long, default_value_t = 3)]
        batch: usize,

        /// Milliseconds to wait for each fetch
        #[arg(long, default_value_t = 2000)]
        max_wait_ms: u64,
    },

    /// Serve the user management service until interrupted
    Service,
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                    _ = sigint.recv() => info!("Received SIGINT"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => warn!("failed to install signal handlers: {e}"),
        }
    }

    let _ = tokio::signal::ctrl_c().await;
    info!("Received interrupt signal");
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let shutdown_token = CancellationToken::new();
    let signal_shutdown_token = shutdown_token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutting down");
        signal_shutdown_token.cancel();
    });

    commands::run(&args.connect_options(), args.command, &shutdown_token).await
}
