use thiserror::Error;

/// Errors that can occur while running a service.
#[derive(Debug, Error)]
pub enum Error {
    /// An endpoint could not be registered.
    #[error("failed to add endpoint {0}: {1}")]
    Endpoint(String, async_nats::Error),

    /// The service could not be registered.
    #[error("failed to start service: {0}")]
    Start(async_nats::Error),

    /// The service did not stop cleanly.
    #[error("failed to stop service: {0}")]
    Stop(async_nats::Error),
}
