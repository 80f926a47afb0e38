//! Object store scenarios: progress-tracked uploads and downloads of local files.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::Path;

use async_nats::jetstream::Context as JetStreamContext;
use async_nats::jetstream::object_store::{Config, ObjectInfo, ObjectMetadata, ObjectStore};
use async_nats::jetstream::stream::StorageType;
use nats_client_progress::ProgressReader;
use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Bucket used by the scenarios unless told otherwise.
pub const DEFAULT_BUCKET: &str = "my_object_store";

/// Options for the object store bucket.
#[derive(Clone, Debug)]
pub struct ObjectStoreOptions {
    /// Bucket name.
    pub bucket: String,

    /// Number of replicas. Must not exceed the cluster size.
    pub replicas: usize,

    /// Whether objects are stored on disk rather than in memory.
    pub persist: bool,
}

impl Default for ObjectStoreOptions {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            replicas: 2,
            persist: true,
        }
    }
}

impl ObjectStoreOptions {
    fn config(&self) -> Config {
        Config {
            bucket: self.bucket.clone(),
            num_replicas: self.replicas,
            storage: if self.persist {
                StorageType::File
            } else {
                StorageType::Memory
            },
            ..Default::default()
        }
    }
}

/// Creates the object store. If the bucket already exists with a different
/// configuration it is opened as it is, keeping its existing settings.
///
/// # Errors
///
/// Returns `Error::Create` if the bucket can neither be created nor opened.
pub async fn create_store(
    context: &JetStreamContext,
    options: &ObjectStoreOptions,
) -> Result<ObjectStore, Error> {
    match context.create_object_store(options.config()).await {
        Ok(store) => {
            info!(bucket = %options.bucket, replicas = options.replicas, "object store ready");
            Ok(store)
        }
        Err(create_error) => {
            warn!(bucket = %options.bucket, error = %create_error, "could not create object store, opening it");

            let store = context
                .get_object_store(&options.bucket)
                .await
                .map_err(|_| Error::Create(create_error.kind()))?;

            info!(bucket = %options.bucket, "opened existing object store");
            Ok(store)
        }
    }
}

/// Opens an existing object store.
///
/// # Errors
///
/// Returns `Error::Open` if the bucket does not exist.
pub async fn open_store(context: &JetStreamContext, bucket: &str) -> Result<ObjectStore, Error> {
    let store = context
        .get_object_store(bucket)
        .await
        .map_err(|e| Error::Open(e.kind()))?;

    info!(bucket, "opened object store");
    Ok(store)
}

/// Descriptive data stored alongside an uploaded object.
#[derive(Clone, Debug, Default)]
pub struct UploadMeta {
    /// Object name.
    pub name: String,

    /// Free-form description.
    pub description: Option<String>,

    /// User metadata.
    pub metadata: HashMap<String, String>,
}

impl UploadMeta {
    /// Metadata naming the object after the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoObjectName` if `path` has no UTF-8 file name.
    pub fn for_path(path: &Path) -> Result<Self, Error> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::NoObjectName(path.to_path_buf()))?;

        Ok(Self {
            name: name.to_string(),
            ..Self::default()
        })
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a metadata pair.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl From<UploadMeta> for ObjectMetadata {
    fn from(meta: UploadMeta) -> Self {
        Self {
            name: meta.name,
            description: meta.description,
            metadata: meta.metadata,
            ..Default::default()
        }
    }
}

/// Hex encoded SHA-256 of everything `reader` yields.
async fn sha256_reader<R>(reader: &mut R) -> Result<String, Error>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let read = reader.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hex encoded SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns `Error::Io` if the file cannot be read.
pub async fn sha256_file(path: &Path) -> Result<String, Error> {
    let mut file = File::open(path).await?;
    sha256_reader(&mut file).await
}

/// Result of [`upload_file`].
#[derive(Clone, Debug)]
pub struct UploadReport {
    /// Object info returned by the server.
    pub info: ObjectInfo,

    /// Hex SHA-256 of the local file.
    pub sha256: String,
}

/// Uploads the file at `path` as `meta.name`, reporting progress as it is read.
///
/// The file is hashed first, then rewound and streamed to the store through a
/// [`ProgressReader`] sized by the file length.
///
/// # Errors
///
/// Returns `Error::Io` for local file problems and `Error::Put` if the upload fails.
pub async fn upload_file<F>(
    store: &ObjectStore,
    path: &Path,
    meta: UploadMeta,
    on_progress: F,
) -> Result<UploadReport, Error>
where
    F: FnMut(u64, u64) + Send + 'static,
{
    let mut file = File::open(path).await?;
    let size = file.metadata().await?.len();
    info!(path = %path.display(), size, "opened file");

    let sha256 = sha256_reader(&mut file).await?;
    info!(sha256 = %sha256, "file SHA-256");

    file.seek(SeekFrom::Start(0)).await?;
    debug!("rewound file for upload");

    let name = meta.name.clone();
    let mut reader = ProgressReader::with_callback(file, size, on_progress);
    let info = store
        .put(ObjectMetadata::from(meta), &mut reader)
        .await
        .map_err(|e| Error::Put(e.kind()))?;

    info!(name = %name, size = info.size, "uploaded object");
    Ok(UploadReport { info, sha256 })
}

/// Result of [`download_file`].
#[derive(Clone, Debug)]
pub struct DownloadReport {
    /// Object info as stored.
    pub info: ObjectInfo,

    /// Bytes written to the destination.
    pub bytes: u64,
}

/// Downloads object `name` into `dest`, reporting progress as it is read.
///
/// `dest` is created or truncated; missing parent directories are created.
///
/// # Errors
///
/// Returns `Error::Get` if the object cannot be fetched and `Error::Io` if the
/// copy fails (including a digest mismatch detected by the client).
pub async fn download_file<F>(
    store: &ObjectStore,
    name: &str,
    dest: &Path,
    on_progress: F,
) -> Result<DownloadReport, Error>
where
    F: FnMut(u64, u64) + Send + 'static,
{
    let object = store.get(name).await.map_err(|e| Error::Get(e.kind()))?;
    let info = object.info().clone();

    info!(
        name = %info.name,
        size = info.size,
        modified = ?info.modified,
        "fetching object"
    );
    for (key, value) in &info.metadata {
        info!(key = %key, value = %value, "object metadata");
    }

    if let Some(parent) = dest.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let mut file = File::create(dest).await?;

    let mut reader = ProgressReader::with_callback(object, info.size as u64, on_progress);
    let bytes = tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;

    info!(name, dest = %dest.display(), bytes, "object copied");
    Ok(DownloadReport { info, bytes })
}
