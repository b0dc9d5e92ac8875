use std::error::Error;
use thiserror::Error;

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Error raised by transport backends regardless of the underlying protocol.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The server rejected the session credential.
    #[error("credential rejected: {message}")]
    Unauthorized { message: String },
    /// The server answered but refused the request.
    #[error("request rejected: {message}")]
    Rejected { message: String },
}

impl TransportError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        TransportError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Whether the failure means the credential is stale and the session must be cleared.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TransportError::Unauthorized { .. })
    }
}
