/// Errors from the connection layer.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// Every liveness attempt failed; the server is treated as down.
    #[error("server unreachable after {attempts} attempts")]
    Unreachable {
        attempts: u32,
        #[source]
        last: comfylink_api::ApiError,
    },

    /// The supervisor task is gone.
    #[error("connection supervisor is not running")]
    Stopped,
}
