//! Client error types.

use thiserror::Error;

/// Result type for backup client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the backup API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed (connect, timeout, body decode).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response was well-formed HTTP but not what the API promises.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    /// HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::UnexpectedResponse(_) => None,
        }
    }
}
