use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Time of the last sign of life on the realtime channel.
///
/// Written by the frame router and the supervisor, read by the heartbeat.
/// Cheap to clone; clones share the same instant.
#[derive(Debug, Clone)]
pub struct ActivityClock {
    last: Arc<Mutex<Instant>>,
}

impl ActivityClock {
    /// A clock whose last activity is now.
    pub fn new() -> Self {
        Self {
            last: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Records activity now.
    pub fn touch(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn last(&self) -> Instant {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time since the last activity.
    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last())
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_idle_for_tracks_time_since_touch() {
        let clock = ActivityClock::new();
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(clock.idle_for(), Duration::from_secs(4));

        clock.clone().touch();
        assert_eq!(clock.idle_for(), Duration::ZERO);
    }
}
