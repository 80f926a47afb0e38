//! Key-value bucket scenarios: optimistic revisioned updates and change watching.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::time::Duration;

use async_nats::jetstream::Context as JetStreamContext;
use async_nats::jetstream::kv::{Config, Entry, Operation, Store, Watch};
use async_nats::jetstream::stream::StorageType;
use bytes::Bytes;
use futures::StreamExt;
use tracing::{debug, info, warn};

/// Bucket used by the scenarios unless told otherwise.
pub const DEFAULT_BUCKET: &str = "my_bucket";

/// Options for the key-value bucket.
#[derive(Clone, Debug)]
pub struct KvBucketOptions {
    /// Bucket name.
    pub bucket: String,

    /// Maximum age of entries. `Duration::ZERO` disables expiry.
    pub max_age: Duration,

    /// Number of revisions kept per key.
    pub history: i64,

    /// Whether the bucket is stored on disk rather than in memory.
    pub persist: bool,
}

impl Default for KvBucketOptions {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            max_age: Duration::from_secs(10),
            history: 10,
            persist: true,
        }
    }
}

impl KvBucketOptions {
    fn config(&self) -> Config {
        Config {
            bucket: self.bucket.clone(),
            history: self.history,
            max_age: self.max_age,
            storage: if self.persist {
                StorageType::File
            } else {
                StorageType::Memory
            },
            ..Default::default()
        }
    }
}

/// Creates the bucket or applies `options` to the existing one, falling back to
/// opening it as it is if the server refuses the configuration.
///
/// # Errors
///
/// Returns `Error::Bucket` if the bucket can neither be created nor opened.
pub async fn open_or_create_bucket(
    context: &JetStreamContext,
    options: &KvBucketOptions,
) -> Result<Store, Error> {
    match context.create_or_update_key_value(options.config()).await {
        Ok(store) => {
            info!(bucket = %options.bucket, history = options.history, "key-value bucket ready");
            Ok(store)
        }
        Err(e) => {
            warn!(bucket = %options.bucket, error = %e, "could not create or update key-value bucket, opening it");

            let store = context
                .get_key_value(options.bucket.clone())
                .await
                .map_err(|e| Error::Bucket(e.kind()))?;

            info!(bucket = %options.bucket, "opened key-value bucket");
            Ok(store)
        }
    }
}

/// Deletes the bucket and everything in it.
///
/// # Errors
///
/// Returns `Error::DeleteBucket` if the server refuses.
pub async fn delete_bucket(context: &JetStreamContext, bucket: &str) -> Result<(), Error> {
    context
        .delete_key_value(bucket)
        .await
        .map_err(|e| Error::DeleteBucket(e.kind()))?;

    info!(bucket, "deleted key-value bucket");
    Ok(())
}

/// Creates `key` with `value` and returns its revision.
///
/// If the key cannot be created (usually because it already exists) the
/// current revision of the existing entry is returned instead.
///
/// # Errors
///
/// Returns `Error::Create` if the key could not be created and has no live
/// entry, or `Error::Entry` if reading it back failed.
pub async fn create_or_get_revision(store: &Store, key: &str, value: Bytes) -> Result<u64, Error> {
    match store.create(key, value).await {
        Ok(revision) => {
            info!(key, revision, "created entry");
            Ok(revision)
        }
        Err(create_error) => {
            debug!(key, error = %create_error, "create refused, reading existing entry");

            let entry = store
                .entry(key)
                .await
                .map_err(|e| Error::Entry(e.kind()))?
                .filter(|entry| matches!(entry.operation, Operation::Put))
                .ok_or_else(|| Error::Create(create_error.kind()))?;

            info!(key, revision = entry.revision, "opened existing entry");
            Ok(entry.revision)
        }
    }
}

/// A live value read back from the bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObservedEntry {
    /// Key of the entry.
    pub key: String,

    /// Stored value.
    pub value: Bytes,

    /// Revision the value was written at.
    pub revision: u64,
}

impl From<Entry> for ObservedEntry {
    fn from(entry: Entry) -> Self {
        Self {
            key: entry.key,
            value: entry.value,
            revision: entry.revision,
        }
    }
}

/// Outcome of [`run_updates`].
#[derive(Clone, Debug)]
pub struct UpdateRun {
    /// Last revision known to the caller.
    pub revision: u64,

    /// What was read back after each update; `None` when the key was missing or expired.
    pub observed: Vec<Option<ObservedEntry>>,
}

/// Value written by update number `n` (1-based).
#[must_use]
pub fn update_value(n: usize) -> Bytes {
    Bytes::from(format!("Hello, NATS! Message number {n}"))
}

/// Performs `count` optimistic updates of `key`, starting from `revision`.
///
/// Each update passes the last revision this caller saw. An update rejected by
/// the server (for instance because someone else wrote the key in between) is
/// logged and the known revision stays as it was. After every update the entry
/// is read back and logged. `interval` is slept between iterations.
pub async fn run_updates(
    store: &Store,
    key: &str,
    mut revision: u64,
    count: usize,
    interval: Duration,
) -> UpdateRun {
    let mut observed = Vec::with_capacity(count);

    for n in 1..=count {
        match store.update(key, update_value(n), revision).await {
            Ok(next) => revision = next,
            Err(e) => warn!(key, revision, error = %e, "update rejected"),
        }

        let entry = match store.entry(key).await {
            Ok(entry) => entry.filter(|entry| matches!(entry.operation, Operation::Put)),
            Err(e) => {
                warn!(key, error = %e, "failed to read entry");
                None
            }
        };

        match &entry {
            Some(entry) => info!(
                key = %entry.key,
                value = %String::from_utf8_lossy(&entry.value),
                revision = entry.revision,
                "read entry"
            ),
            None => info!(key, "key not found or expired"),
        }

        observed.push(entry.map(ObservedEntry::from));

        if n < count && !interval.is_zero() {
            tokio::time::sleep(interval).await;
        }
    }

    UpdateRun { revision, observed }
}

/// Writes `value` under `key`, returning the new revision.
///
/// # Errors
///
/// Returns `Error::Put` if the write is refused.
pub async fn put(store: &Store, key: &str, value: Bytes) -> Result<u64, Error> {
    store.put(key, value).await.map_err(|e| Error::Put(e.kind()))
}

/// Places a delete marker on `key`.
///
/// # Errors
///
/// Returns `Error::Delete` if the server refuses.
pub async fn delete(store: &Store, key: &str) -> Result<(), Error> {
    store.delete(key).await.map_err(|e| Error::Delete(e.kind()))
}

/// Removes `key` and all of its history.
///
/// # Errors
///
/// Returns `Error::Purge` if the server refuses.
pub async fn purge(store: &Store, key: &str) -> Result<(), Error> {
    store.purge(key).await.map_err(|e| Error::Purge(e.kind()))?;
    info!(key, "purged key");
    Ok(())
}

/// What happened to a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    /// Written or updated.
    Put,

    /// Delete marker placed.
    Delete,

    /// Purged along with its history.
    Purge,
}

impl From<Operation> for ChangeKind {
    fn from(operation: Operation) -> Self {
        match operation {
            Operation::Put => Self::Put,
            Operation::Delete => Self::Delete,
            Operation::Purge => Self::Purge,
        }
    }
}

/// A change seen by a watcher.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    /// Changed key.
    pub key: String,

    /// New value (empty for deletes and purges).
    pub value: Bytes,

    /// Revision of the change.
    pub revision: u64,

    /// Kind of change.
    pub kind: ChangeKind,
}

impl From<Entry> for Change {
    fn from(entry: Entry) -> Self {
        Self {
            kind: entry.operation.into(),
            key: entry.key,
            value: entry.value,
            revision: entry.revision,
        }
    }
}

/// Condition that ends a watch: `key` written with `value`.
#[derive(Clone, Debug)]
pub struct WatchStop {
    key: String,
    value: Bytes,
}

impl WatchStop {
    /// Stops once `key` is written with exactly `value`.
    pub fn on_value(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    fn matches(&self, change: &Change) -> bool {
        change.kind == ChangeKind::Put && change.key == self.key && change.value == self.value
    }
}

/// Watches every key in a bucket.
///
/// Dropping the watcher stops the watch.
pub struct KvWatcher {
    watch: Watch,
}

impl KvWatcher {
    /// Starts watching.
    ///
    /// With `history` the current value of every key is delivered first;
    /// otherwise only changes made after the watch started are seen.
    ///
    /// # Errors
    ///
    /// Returns `Error::Watch` if the watch cannot be set up.
    pub async fn start(store: &Store, history: bool) -> Result<Self, Error> {
        let watch = if history {
            store.watch_with_history(">").await
        } else {
            store.watch_all().await
        };
        let watch = watch.map_err(|e| Error::Watch(e.kind()))?;

        info!(history, "watching key-value changes");
        Ok(Self { watch })
    }

    /// Waits for the next change. `None` once the watch has ended.
    pub async fn next_change(&mut self) -> Option<Result<Change, Error>> {
        let entry = self.watch.next().await?;
        Some(
            entry
                .map(Change::from)
                .map_err(|e| Error::Watcher(e.kind())),
        )
    }

    /// Logs changes until `stop` matches or the watch ends, returning them all.
    ///
    /// # Errors
    ///
    /// Returns `Error::Watcher` if the underlying watch fails.
    pub async fn until(mut self, stop: Option<WatchStop>) -> Result<Vec<Change>, Error> {
        let mut changes = Vec::new();

        while let Some(change) = self.next_change().await {
            let change = change?;

            match change.kind {
                ChangeKind::Put => info!(
                    key = %change.key,
                    value = %String::from_utf8_lossy(&change.value),
                    revision = change.revision,
                    "key written"
                ),
                ChangeKind::Delete => {
                    info!(key = %change.key, revision = change.revision, "key deleted");
                }
                ChangeKind::Purge => {
                    info!(key = %change.key, revision = change.revision, "key purged");
                }
            }

            let done = stop.as_ref().is_some_and(|stop| stop.matches(&change));
            changes.push(change);

            if done {
                break;
            }
        }

        info!(changes = changes.len(), "watch finished");
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(kind: ChangeKind, key: &str, value: &'static [u8]) -> Change {
        Change {
            key: key.to_string(),
            value: Bytes::from_static(value),
            revision: 1,
            kind,
        }
    }

    #[test]
    fn stop_matches_only_the_exact_write() {
        let stop = WatchStop::on_value("foo", "baz");

        assert!(stop.matches(&change(ChangeKind::Put, "foo", b"baz")));
        assert!(!stop.matches(&change(ChangeKind::Put, "foo", b"bar")));
        assert!(!stop.matches(&change(ChangeKind::Put, "other", b"baz")));
        assert!(!stop.matches(&change(ChangeKind::Delete, "foo", b"baz")));
    }

    #[test]
    fn operations_map_to_change_kinds() {
        assert_eq!(ChangeKind::from(Operation::Put), ChangeKind::Put);
        assert_eq!(ChangeKind::from(Operation::Delete), ChangeKind::Delete);
        assert_eq!(ChangeKind::from(Operation::Purge), ChangeKind::Purge);
    }

    #[test]
    fn update_values_are_numbered_from_one() {
        assert_eq!(update_value(1), Bytes::from("Hello, NATS! Message number 1"));
        assert_eq!(update_value(10), Bytes::from("Hello, NATS! Message number 10"));
    }

    #[test]
    fn default_bucket_config() {
        let config = KvBucketOptions::default().config();

        assert_eq!(config.bucket, DEFAULT_BUCKET);
        assert_eq!(config.history, 10);
        assert_eq!(config.max_age, Duration::from_secs(10));
        assert_eq!(config.storage, StorageType::File);
    }
}
