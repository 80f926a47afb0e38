use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the object store scenarios.
#[derive(Debug, Error)]
pub enum Error {
    /// Object store create error.
    #[error("failed to create object store: {0}")]
    Create(async_nats::jetstream::context::CreateObjectStoreErrorKind),

    /// Object fetch error.
    #[error("failed to get object: {0}")]
    Get(async_nats::jetstream::object_store::GetErrorKind),

    /// Local file error.
    #[error("file error: {0}")]
    Io(#[from] std::io::Error),

    /// Object store open error.
    #[error("failed to open object store: {0}")]
    Open(async_nats::jetstream::context::ObjectStoreErrorKind),

    /// Upload path has no usable file name to name the object after.
    #[error("no object name can be derived from {0}")]
    NoObjectName(PathBuf),

    /// Object upload error.
    #[error("failed to put object: {0}")]
    Put(async_nats::jetstream::object_store::PutErrorKind),
}
