use thiserror::Error;

/// Errors that can occur in the key-value scenarios.
#[derive(Debug, Error)]
pub enum Error {
    /// Bucket could neither be created nor opened.
    #[error("failed to open key-value bucket: {0}")]
    Bucket(async_nats::jetstream::context::KeyValueErrorKind),

    /// Key could neither be created nor read back.
    #[error("failed to create key: {0}")]
    Create(async_nats::jetstream::kv::CreateErrorKind),

    /// Key delete error.
    #[error("failed to delete key: {0}")]
    Delete(async_nats::jetstream::kv::DeleteErrorKind),

    /// Bucket delete error.
    #[error("failed to delete key-value bucket: {0}")]
    DeleteBucket(async_nats::jetstream::context::KeyValueErrorKind),

    /// Entry read error.
    #[error("failed to read entry: {0}")]
    Entry(async_nats::jetstream::kv::EntryErrorKind),

    /// Purge error.
    #[error("failed to purge key: {0}")]
    Purge(async_nats::jetstream::kv::PurgeErrorKind),

    /// Put error.
    #[error("failed to put key: {0}")]
    Put(async_nats::jetstream::kv::PutErrorKind),

    /// Watch could not be started.
    #[error("failed to start watch: {0}")]
    Watch(async_nats::jetstream::kv::WatchErrorKind),

    /// Watch stream failed.
    #[error("watch stream error: {0}")]
    Watcher(async_nats::jetstream::kv::WatcherErrorKind),
}
