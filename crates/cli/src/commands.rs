use std::io::Write;
use std::path::Path;
use std::time::Duration;

use async_nats::Client;
use async_nats::jetstream::Context as JetStreamContext;
use bytes::Bytes;
use nats_client_connect::{NatsConnectOptions, connect, jetstream, shutdown};
use nats_client_kv::{
    KvBucketOptions, KvWatcher, WatchStop, create_or_get_revision, open_or_create_bucket, purge,
    run_updates,
};
use nats_client_object_store::{
    ObjectStoreOptions, UploadMeta, create_store, download_file, open_store, upload_file,
};
use nats_client_progress::percent;
use nats_client_service::{ServiceDefinition, start};
use nats_client_streams::{
    LoggingHandler, PullOptions, QueueSubscribeOptions, StreamOptions, ensure_stream,
    publish_batch, pull_drain, queue_subscribe,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{Command, Error};

/// Parses a `key=value` pair.
pub fn parse_key_value(pair: &str) -> Result<(String, String), String> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{pair}`"))?;

    if key.is_empty() {
        return Err(format!("empty key in `{pair}`"));
    }

    Ok((key.to_string(), value.to_string()))
}

/// Renders `\rprogress: xx.xx%` on stdout.
fn print_progress(bytes_read: u64, total: u64) {
    let mut stdout = std::io::stdout().lock();
    // Best effort: a closed stdout must not abort the transfer.
    let _ = write!(stdout, "\rprogress: {:.2}%", percent(bytes_read, total));
    let _ = stdout.flush();
}

fn end_progress_line() {
    println!();
}

pub async fn run(
    options: &NatsConnectOptions,
    command: Command,
    shutdown_token: &CancellationToken,
) -> Result<(), Error> {
    let client = connect(options).await?;
    let context = jetstream(client.clone(), options.domain.as_deref());

    let result = dispatch(&client, &context, command, shutdown_token).await;

    shutdown(client).await?;
    result
}

async fn dispatch(
    client: &Client,
    context: &JetStreamContext,
    command: Command,
    shutdown_token: &CancellationToken,
) -> Result<(), Error> {
    match command {
        Command::KvUpdate {
            bucket,
            key,
            count,
            interval_ms,
        } => kv_update(context, bucket, &key, count, interval_ms).await,
        Command::KvWatch {
            bucket,
            updates_only,
            stop_key,
            stop_value,
        } => {
            kv_watch(
                context,
                bucket,
                !updates_only,
                WatchStop::on_value(stop_key, stop_value),
                shutdown_token,
            )
            .await
        }
        Command::ObjectPut {
            file,
            bucket,
            replicas,
            object_name,
            description,
            metadata,
        } => {
            let mut meta = UploadMeta::for_path(&file)?;
            if let Some(name) = object_name {
                meta.name = name;
            }
            meta.description = description;
            meta.metadata.extend(metadata);

            let options = ObjectStoreOptions {
                bucket,
                replicas,
                ..ObjectStoreOptions::default()
            };
            object_put(context, &options, &file, meta).await
        }
        Command::ObjectGet { name, dest, bucket } => {
            object_get(context, &bucket, &name, &dest).await
        }
        Command::StreamPub { subjects, count } => stream_pub(context, &subjects, count).await,
        Command::StreamQueueSub {
            subject,
            queue,
            durable,
        } => {
            let options = QueueSubscribeOptions::new(subject, queue, durable);
            stream_queue_sub(context, &options, shutdown_token).await
        }
        Command::StreamPullSub {
            subject,
            durable,
            batch,
            max_wait_ms,
        } => {
            let options = PullOptions {
                batch,
                max_wait: Duration::from_millis(max_wait_ms),
                ..PullOptions::new(subject, durable)
            };
            let handled = pull_drain(context, &options, &LoggingHandler).await?;
            info!(handled, "no more messages");
            Ok(())
        }
        Command::Service => service(client, shutdown_token).await,
    }
}

async fn kv_update(
    context: &JetStreamContext,
    bucket: String,
    key: &str,
    count: usize,
    interval_ms: u64,
) -> Result<(), Error> {
    let options = KvBucketOptions {
        bucket,
        ..KvBucketOptions::default()
    };
    let store = open_or_create_bucket(context, &options).await?;

    let revision = create_or_get_revision(&store, key, Bytes::from_static(b"Hello, NATS! ")).await?;
    let run = run_updates(
        &store,
        key,
        revision,
        count,
        Duration::from_millis(interval_ms),
    )
    .await;
    info!(key, revision = run.revision, "updates finished");

    purge(&store, key).await?;
    Ok(())
}

async fn kv_watch(
    context: &JetStreamContext,
    bucket: String,
    history: bool,
    stop: WatchStop,
    shutdown_token: &CancellationToken,
) -> Result<(), Error> {
    let options = KvBucketOptions {
        bucket,
        ..KvBucketOptions::default()
    };
    let store = open_or_create_bucket(context, &options).await?;
    let watcher = KvWatcher::start(&store, history).await?;

    tokio::select! {
        changes = watcher.until(Some(stop)) => {
            info!(changes = changes?.len(), "watch finished");
        }
        () = shutdown_token.cancelled() => info!("watch interrupted"),
    }

    Ok(())
}

async fn object_put(
    context: &JetStreamContext,
    options: &ObjectStoreOptions,
    file: &Path,
    meta: UploadMeta,
) -> Result<(), Error> {
    let store = create_store(context, options).await?;

    let report = upload_file(&store, file, meta, print_progress).await;
    end_progress_line();
    let report = report?;

    info!(
        name = %report.info.name,
        size = report.info.size,
        sha256 = %report.sha256,
        "upload complete"
    );
    Ok(())
}

async fn object_get(
    context: &JetStreamContext,
    bucket: &str,
    name: &str,
    dest: &Path,
) -> Result<(), Error> {
    let store = open_store(context, bucket).await?;

    let report = download_file(&store, name, dest, print_progress).await;
    end_progress_line();
    let report = report?;

    info!(name, bytes = report.bytes, dest = %dest.display(), "download complete");
    Ok(())
}

async fn stream_pub(
    context: &JetStreamContext,
    subjects: &[String],
    count: usize,
) -> Result<(), Error> {
    ensure_stream(context, &StreamOptions::default()).await?;

    for subject in subjects {
        let published = publish_batch(context, subject, count).await?;
        info!(subject = %subject, messages = published.len(), "batch published");
    }

    Ok(())
}

async fn stream_queue_sub(
    context: &JetStreamContext,
    options: &QueueSubscribeOptions,
    shutdown_token: &CancellationToken,
) -> Result<(), Error> {
    let subscription = queue_subscribe(context, options, LoggingHandler).await?;

    shutdown_token.cancelled().await;
    subscription.unsubscribe();
    Ok(())
}

async fn service(client: &Client, shutdown_token: &CancellationToken) -> Result<(), Error> {
    let running = start(client, ServiceDefinition::user_service()).await?;
    info!(service = %running.name(), "serving until interrupted");

    shutdown_token.cancelled().await;
    running.stop().await?;
    Ok(())
}
