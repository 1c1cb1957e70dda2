//! Retry policy for blob-store calls.
//!
//! PUT and DELETE are idempotent by key, so a call is repeated when the
//! transport fails or the gateway reports a transient condition (502, 503,
//! 504, 429). Any other response goes back to the caller unchanged.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;

/// Exponential backoff: `base_delay`, doubled per retry, at most `retries`
/// retries after the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Retry without waiting. For tests.
    pub fn immediate(retries: u32) -> Self {
        Self {
            retries,
            base_delay: Duration::ZERO,
        }
    }

    fn delay(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }

    /// Run `send` until it yields a final outcome or the retries run out.
    pub(crate) async fn run<F, Fut>(
        &self,
        endpoint: &str,
        send: F,
    ) -> Result<reqwest::Response, reqwest::Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let mut retry = 0;
        loop {
            let outcome = send().await;
            let transient = match &outcome {
                Ok(resp) => is_transient(resp.status()),
                Err(e) => !e.is_builder(),
            };
            if !transient || retry >= self.retries {
                return outcome;
            }
            let delay = self.delay(retry);
            match &outcome {
                Ok(resp) => tracing::warn!(endpoint, status = resp.status().as_u16(), retry = retry + 1, ?delay, "blob store busy, retrying"),
                Err(e) => tracing::warn!(endpoint, error = %e, retry = retry + 1, ?delay, "blob store unreachable, retrying"),
            }
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(200));
        assert_eq!(policy.delay(2), Duration::from_millis(800));
    }

    #[test]
    fn only_gateway_conditions_are_transient() {
        assert!(is_transient(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_transient(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_transient(StatusCode::INSUFFICIENT_STORAGE));
        assert!(!is_transient(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn unreachable_host_uses_every_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();

        let result = RetryPolicy::immediate(2)
            .run("DELETE /bucket/key", || {
                counter.fetch_add(1, Ordering::SeqCst);
                client.delete("http://127.0.0.1:1/bucket/key").send()
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
