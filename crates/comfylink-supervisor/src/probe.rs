use comfylink_api::ServerApi;

use crate::{ProbeConfig, SupervisorError};

/// Polls `GET /prompt` until the server answers `200`.
///
/// Makes one initial attempt plus up to `config.max_tries` retries,
/// sleeping `config.delay` between them. Returns how many attempts it
/// took.
///
/// # Errors
/// [`SupervisorError::Unreachable`] after `max_tries + 1` failures.
pub async fn probe_liveness(
    api: &dyn ServerApi,
    config: &ProbeConfig,
) -> Result<u32, SupervisorError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match api.poll_status(config.timeout).await {
            Ok(_) => {
                tracing::debug!(attempts, "server is reachable");
                return Ok(attempts);
            }
            Err(error) if attempts > config.max_tries => {
                tracing::warn!(attempts, %error, "server unreachable, giving up");
                return Err(SupervisorError::Unreachable {
                    attempts,
                    last: error,
                });
            }
            Err(error) => {
                tracing::debug!(attempts, %error, "liveness probe failed, retrying");
                tokio::time::sleep(config.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use comfylink_api::{ApiError, ApiRequest, ApiResponse};

    /// Fails the first `failures` liveness calls with a 503.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ServerApi for Flaky {
        async fn send(&self, _request: ApiRequest) -> Result<ApiResponse, ApiError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            let status = if call > self.failures { 200 } else { 503 };
            Ok(ApiResponse::new(status, "{}"))
        }
    }

    fn config(max_tries: u32) -> ProbeConfig {
        ProbeConfig {
            max_tries,
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_stops_probing() {
        let api = Flaky { failures: 2, calls: AtomicU32::new(0) };
        let attempts = probe_liveness(&api, &config(10)).await.unwrap();
        assert_eq!(attempts, 3);
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_tries_plus_one() {
        let api = Flaky { failures: u32::MAX, calls: AtomicU32::new(0) };
        let start = tokio::time::Instant::now();

        let err = probe_liveness(&api, &config(3)).await.unwrap_err();

        assert!(matches!(err, SupervisorError::Unreachable { attempts: 4, .. }));
        assert_eq!(api.calls.load(Ordering::SeqCst), 4);
        // Three pauses between four attempts.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_means_single_attempt() {
        let api = Flaky { failures: 1, calls: AtomicU32::new(0) };
        let err = probe_liveness(&api, &config(0)).await.unwrap_err();
        assert!(matches!(err, SupervisorError::Unreachable { attempts: 1, .. }));
    }
}
