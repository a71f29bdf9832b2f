//! Supervisor configuration and the connection state machine.

use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// SupervisorConfig
// ---------------------------------------------------------------------------

/// Timing of the heartbeat and of reconnect episodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// A connection silent for longer than this is considered dead. The
    /// heartbeat checks every `idle_timeout / 2`.
    pub idle_timeout: Duration,

    /// Reconnect check delay grows by this much per attempt...
    pub reconnect_base_delay: Duration,

    /// ...up to this cap.
    pub reconnect_max_delay: Duration,
}

impl SupervisorConfig {
    /// Smallest accepted idle timeout.
    pub const MIN_IDLE_TIMEOUT: Duration = Duration::from_millis(100);

    /// Clamps out-of-range values.
    pub fn validated(mut self) -> Self {
        if self.idle_timeout < Self::MIN_IDLE_TIMEOUT {
            tracing::warn!(
                idle_timeout = ?self.idle_timeout,
                min = ?Self::MIN_IDLE_TIMEOUT,
                "idle_timeout below minimum, clamping"
            );
            self.idle_timeout = Self::MIN_IDLE_TIMEOUT;
        }
        if self.reconnect_base_delay.is_zero() {
            self.reconnect_base_delay = Duration::from_millis(1);
        }
        if self.reconnect_max_delay < self.reconnect_base_delay {
            self.reconnect_max_delay = self.reconnect_base_delay;
        }
        self
    }

    /// Heartbeat period.
    pub fn heartbeat_period(&self) -> Duration {
        self.idle_timeout / 2
    }

    /// Delay before checking reconnect attempt `attempt` (1-based):
    /// `min(attempt * base, max)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.reconnect_base_delay
            .saturating_mul(attempt)
            .min(self.reconnect_max_delay)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(10),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// ProbeConfig
// ---------------------------------------------------------------------------

/// Liveness probing before the realtime channel is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Retries after the initial attempt. `max_tries + 1` failures in a
    /// row give up.
    pub max_tries: u32,
    /// Pause between attempts.
    pub delay: Duration,
    /// Per-attempt request timeout.
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_tries: 10,
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Lifecycle state of the realtime channel.
///
/// ```text
/// Idle → Probing → Open ⇄ Reconnecting
///                    ↘        ↙
///                     Closed
/// ```
///
/// - **Idle**: nothing started yet.
/// - **Probing**: liveness confirmed or in progress; first transport
///   being dialled.
/// - **Open**: a transport is open and delivering frames.
/// - **Reconnecting**: inside a reconnect episode.
/// - **Closed**: terminal. Reached through shutdown or an unreachable
///   server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Probing,
    Open,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    /// Whether a close or an idle timeout starts a reconnect episode.
    pub fn can_begin_episode(self) -> bool {
        matches!(self, Self::Probing | Self::Open)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Probing => "Probing",
            Self::Open => "Open",
            Self::Reconnecting => "Reconnecting",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}
