use thiserror::Error;

/// Error returned by [`Handler::handle`](crate::handler::Handler::handle).
///
/// Malformed attributes never produce an error; only a payload that
/// cannot be encoded or a sink that rejects the write surface here.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The assembled entry could not be encoded as JSON.
    #[error("failed to encode log entry: {0}")]
    Encode(#[from] serde_json::Error),

    /// The sink failed or refused the serialized entry.
    #[error("failed to write log entry: {0}")]
    Write(#[from] std::io::Error),
}
