//! Bounded retry for anti-bot `403 Forbidden` responses.
//!
//! Embed hosts sit behind bot shields that answer a burst of requests with
//! 403 and recover after a short pause. Any other non-success status is
//! final.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Linear backoff capped at `max_delay_ms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub step_ms: u64,
    pub max_delay_ms: u64,
    /// Total attempts; `0` retries forever.
    pub max_tries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 300,
            step_ms: 200,
            max_delay_ms: 5_000,
            max_tries: 10,
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps, for tests and local mocks.
    #[must_use]
    pub fn immediate(max_tries: u32) -> Self {
        Self {
            base_delay_ms: 0,
            step_ms: 0,
            max_delay_ms: 0,
            max_tries,
        }
    }

    /// Delay before the retry following attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ms = self
            .base_delay_ms
            .saturating_add(self.step_ms.saturating_mul(u64::from(attempt)))
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_tries > 0 && attempt >= self.max_tries
    }
}

/// Send `request`, retrying on 403 with the policy's backoff.
///
/// Returns `Ok(None)` when retries are exhausted or the server answers with
/// any other non-success status. Transport errors are returned as-is.
pub async fn send_with_retry(
    request: RequestBuilder,
    policy: &RetryPolicy,
) -> Result<Option<Response>, reqwest::Error> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        // Streaming bodies cannot be cloned; those get exactly one shot.
        let Some(this_try) = request.try_clone() else {
            return check(request.send().await?);
        };

        let response = this_try.send().await?;
        if response.status() != StatusCode::FORBIDDEN {
            return check(response);
        }

        if policy.exhausted(attempt) {
            warn!(url = %response.url(), attempt, "Giving up after repeated 403");
            return Ok(None);
        }

        let delay = policy.delay_for(attempt);
        debug!(url = %response.url(), attempt, ?delay, "Got 403, retrying");
        tokio::time::sleep(delay).await;
    }
}

fn check(response: Response) -> Result<Option<Response>, reqwest::Error> {
    if response.status().is_success() {
        Ok(Some(response))
    } else {
        warn!(url = %response.url(), status = %response.status(), "Request failed");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_linearly_then_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(700));
        assert_eq!(policy.delay_for(100), Duration::from_millis(5_000));
    }

    #[test]
    fn zero_max_tries_never_exhausts() {
        let policy = RetryPolicy::immediate(0);
        assert!(!policy.exhausted(1_000));
        assert!(RetryPolicy::immediate(3).exhausted(3));
        assert!(!RetryPolicy::immediate(3).exhausted(2));
    }

    #[test]
    fn policy_from_partial_toml() {
        let policy: RetryPolicy = toml::from_str("max_tries = 4").unwrap();
        assert_eq!(policy.max_tries, 4);
        assert_eq!(policy.base_delay_ms, 300);
    }
}
