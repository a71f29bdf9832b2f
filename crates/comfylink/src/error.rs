//! Unified error type for comfylink.

use comfylink_api::ApiError;
use comfylink_session::SessionError;

/// Error returned by the public [`ComfyClient`](crate::ComfyClient) API.
///
/// Realtime-channel failures never appear here; they are published as
/// lifecycle events on the client bus.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The host could not be turned into a session.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An HTTP call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The client was destroyed, or never became ready because the server
    /// was unreachable.
    #[error("client is closed")]
    Closed,
}
