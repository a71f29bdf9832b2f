//! Client configuration.

use std::time::Duration;

use comfylink_session::Credentials;
use comfylink_supervisor::{ProbeConfig, SupervisorConfig};

/// Construction-time options for a [`ComfyClient`](crate::ComfyClient).
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Sent with every HTTP request and the WebSocket handshake. When
    /// set, `init` first checks them against the server.
    pub credentials: Option<Credentials>,

    /// Heartbeat and reconnect timing.
    pub supervisor: SupervisorConfig,

    /// Per-attempt timeout of the liveness probe.
    pub probe_timeout: Duration,

    /// Ask the server to stream its terminal output on the `terminal`
    /// topic.
    pub listen_terminal: bool,
}

impl ClientOptions {
    pub const MIN_PROBE_TIMEOUT: Duration = Duration::from_millis(50);

    /// Clamps out-of-range values.
    pub fn validated(mut self) -> Self {
        self.supervisor = self.supervisor.validated();
        if self.probe_timeout < Self::MIN_PROBE_TIMEOUT {
            tracing::warn!(
                probe_timeout = ?self.probe_timeout,
                min = ?Self::MIN_PROBE_TIMEOUT,
                "probe_timeout below minimum, clamping"
            );
            self.probe_timeout = Self::MIN_PROBE_TIMEOUT;
        }
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn listen_terminal(mut self, enabled: bool) -> Self {
        self.listen_terminal = enabled;
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            credentials: None,
            supervisor: SupervisorConfig::default(),
            probe_timeout: Duration::from_secs(5),
            listen_terminal: false,
        }
    }
}

/// Options for [`ComfyClient::init`](crate::ComfyClient::init).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOptions {
    /// Liveness retries after the first attempt.
    pub max_tries: u32,
    /// Pause between liveness attempts.
    pub delay: Duration,
}

impl InitOptions {
    pub(crate) fn probe_config(&self, timeout: Duration) -> ProbeConfig {
        ProbeConfig {
            max_tries: self.max_tries,
            delay: self.delay,
            timeout,
        }
    }
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            max_tries: 10,
            delay: Duration::from_secs(1),
        }
    }
}
