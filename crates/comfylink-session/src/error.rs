//! Error types for the session layer.

/// Errors that can occur while building a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The API host is not an `http://` or `https://` URL.
    #[error("invalid api host {0:?}: expected http:// or https://")]
    InvalidHost(String),
}
