//! Error types for forwarding.

use thiserror::Error;

/// Transport-level HTTP failure.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Connection could not be established or was interrupted.
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// No response within the allowed time.
    #[error("Request timed out")]
    Timeout,

    /// The client rejected the URL or request.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Failure of a single forward attempt.
#[derive(Debug, Error)]
pub enum RetryableError {
    /// The HTTP transport failed.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The endpoint answered with a non-2xx status.
    #[error("Endpoint returned {status}{}", body_suffix(.body))]
    NonSuccessStatus {
        /// Response status
        status: http::StatusCode,
        /// Response body, when it is valid UTF-8
        body: Option<String>,
    },
}

fn body_suffix(body: &Option<String>) -> String {
    body.as_deref()
        .filter(|b| !b.is_empty())
        .map(|b| format!(": {b}"))
        .unwrap_or_default()
}

/// Failure to forward a reading to the remote endpoint.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// The reading could not be serialized.
    #[error("Failed to serialize reading: {0}")]
    Serialize(#[source] serde_json::Error),

    /// An attempt failed with an error that retrying cannot fix.
    #[error("Forward rejected: {0}")]
    Rejected(#[source] RetryableError),

    /// Every attempt failed.
    #[error("Forward failed after {attempts} attempt(s): {last_error}")]
    MaxRetriesExceeded {
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        #[source]
        last_error: RetryableError,
    },
}

impl From<RetryableError> for ForwardError {
    fn from(error: RetryableError) -> Self {
        Self::Rejected(error)
    }
}
