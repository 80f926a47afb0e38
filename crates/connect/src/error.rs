use thiserror::Error;

/// Errors that can occur while setting up a NATS connection.
#[derive(Debug, Error)]
pub enum Error {
    /// The server could not be reached or rejected the connection.
    #[error("failed to connect to nats server: {0}")]
    Connect(async_nats::ConnectErrorKind),

    /// Pending messages could not be flushed.
    #[error("failed to flush nats connection: {0}")]
    Flush(async_nats::client::FlushErrorKind),
}
