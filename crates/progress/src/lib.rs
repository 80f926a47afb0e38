//! Byte-counting reader decorator that reports progress through a callback.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::io::{self, Read};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio::io::{AsyncRead, ReadBuf};

/// Callback invoked with `(bytes_read, total)` after every completed read.
pub type ProgressCallback = Box<dyn FnMut(u64, u64) + Send>;

/// Wraps a reader and counts the bytes flowing through it.
///
/// The wrapper forwards every read to the inner reader unchanged. Once a read
/// completes, the number of bytes it produced is added to [`bytes_read`], and the
/// progress callback (if any) is called with the new count and the expected
/// total. The callback also fires for zero-byte reads, end of stream and reads
/// that fail, in which case the count is left as it was.
///
/// Reaching `total` is informational only: nothing stops the inner reader from
/// producing more or fewer bytes than announced.
///
/// The inner reader may be owned or borrowed (`&mut R`). It is never closed by
/// the wrapper; use [`into_inner`] to get it back.
///
/// [`bytes_read`]: ProgressReader::bytes_read
/// [`into_inner`]: ProgressReader::into_inner
pub struct ProgressReader<R> {
    inner: R,
    total: u64,
    bytes_read: u64,
    on_progress: Option<ProgressCallback>,
}

impl<R> ProgressReader<R> {
    /// Creates a wrapper around `inner` with no progress callback.
    #[must_use]
    pub const fn new(inner: R, total: u64) -> Self {
        Self {
            inner,
            total,
            bytes_read: 0,
            on_progress: None,
        }
    }

    /// Creates a wrapper around `inner` reporting to `callback`.
    pub fn with_callback<F>(inner: R, total: u64, callback: F) -> Self
    where
        F: FnMut(u64, u64) + Send + 'static,
    {
        Self::new(inner, total).on_progress(callback)
    }

    /// Sets (or replaces) the progress callback.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(u64, u64) + Send + 'static,
    {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Bytes returned by the inner reader so far.
    #[must_use]
    pub const fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Expected total announced at construction.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Gets a reference to the inner reader.
    pub const fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Gets a mutable reference to the inner reader.
    ///
    /// Reading through this reference bypasses the byte count.
    pub const fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwraps the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn record(&mut self, read: usize) {
        self.bytes_read += read as u64;

        if let Some(on_progress) = self.on_progress.as_mut() {
            on_progress(self.bytes_read, self.total);
        }
    }
}

impl<R> Debug for ProgressReader<R>
where
    R: Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ProgressReader")
            .field("inner", &self.inner)
            .field("total", &self.total)
            .field("bytes_read", &self.bytes_read)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl<R> Read for ProgressReader<R>
where
    R: Read,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.inner.read(buf);
        self.record(*result.as_ref().unwrap_or(&0));
        result
    }
}

impl<R> AsyncRead for ProgressReader<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let filled_before = buf.filled().len();

        // A pending poll is not a completed read, so it is not reported.
        let result = ready!(Pin::new(&mut this.inner).poll_read(cx, buf));

        this.record(buf.filled().len() - filled_before);

        Poll::Ready(result)
    }
}

/// Percentage of `total` covered by `bytes_read`, for display.
///
/// An empty transfer (`total == 0`) counts as complete.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn percent(bytes_read: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        bytes_read as f64 / total as f64 * 100.0
    }
}
