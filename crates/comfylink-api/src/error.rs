use std::time::Duration;

/// Errors from HTTP calls to the server.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request did not complete in time and was cancelled.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Transport-level HTTP failure (DNS, refused, TLS, ...).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an unexpected status.
    #[error("{route} returned status {status}")]
    Status { status: u16, route: String },

    /// The response body was not the expected JSON.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Whether the server rejected the credentials (HTTP 401).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401, .. })
    }

    /// The HTTP status, for [`ApiError::Status`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
