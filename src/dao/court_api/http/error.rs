//! Error types shared by the HTTP transport implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::transport::TransportError;

/// Convenient result alias returning [`HttpDaoError`] failures.
pub type HttpResult<T> = Result<T, HttpDaoError>;

/// Failures that can occur while talking to the court-finder service.
#[derive(Debug, Error)]
pub enum HttpDaoError {
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build court API client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send court API request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The server rejected the bearer credential.
    #[error("court API rejected the credential for `{path}`")]
    Unauthorized { path: String },
    /// The server returned an unexpected status code.
    #[error("unexpected court API response status {status} for `{path}`")]
    RequestStatus {
        path: String,
        status: StatusCode,
        message: Option<String>,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode court API response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The event stream body failed mid-flight.
    #[error("event stream interrupted")]
    StreamInterrupted {
        #[source]
        source: reqwest::Error,
    },
}

impl From<HttpDaoError> for TransportError {
    fn from(err: HttpDaoError) -> Self {
        match err {
            HttpDaoError::Unauthorized { path } => TransportError::Unauthorized {
                message: format!("401 from `{path}`"),
            },
            HttpDaoError::RequestStatus {
                path,
                status,
                message,
            } if status.is_client_error() => TransportError::Rejected {
                message: message.unwrap_or_else(|| format!("{status} from `{path}`")),
            },
            other => TransportError::unavailable(other.to_string(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_stale_credential() {
        let err: TransportError = HttpDaoError::Unauthorized {
            path: "/api/presence/status".into(),
        }
        .into();
        assert!(err.is_unauthorized());
    }

    #[test]
    fn client_errors_keep_server_message() {
        let err: TransportError = HttpDaoError::RequestStatus {
            path: "/api/chat/send".into(),
            status: StatusCode::BAD_REQUEST,
            message: Some("Message content is required".into()),
        }
        .into();
        match err {
            TransportError::Rejected { message } => {
                assert_eq!(message, "Message content is required")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn server_errors_are_unavailable() {
        let err: TransportError = HttpDaoError::RequestStatus {
            path: "/api/courts".into(),
            status: StatusCode::BAD_GATEWAY,
            message: None,
        }
        .into();
        assert!(matches!(err, TransportError::Unavailable { .. }));
    }
}
