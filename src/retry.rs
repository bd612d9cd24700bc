//! Bounded exponential backoff for transient external failures.
//!
//! Only operations explicitly marked retriable go through here; policy
//! evaluation and reservation writes never do.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryConfig;

/// Backoff parameters for one class of operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter_enabled: bool,
}

impl RetryPolicy {
    /// Deterministic delay before retrying after attempt `n` (0-indexed),
    /// before jitter: `min(initial * base^n, max)`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let raw = self.initial_delay.as_secs_f64() * self.exponential_base.powi(attempt as i32);
        let capped = raw.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter_enabled {
            let factor: f64 = rand::thread_rng().gen_range(0.5..1.5);
            Duration::from_secs_f64(base.as_secs_f64() * factor)
        } else {
            base
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            exponential_base: config.exponential_base,
            jitter_enabled: config.jitter_enabled,
        }
    }
}

/// Run `operation` up to `policy.max_attempts` times, sleeping between
/// attempts, retrying only failures for which `retriable` returns true.
///
/// Exhaustion propagates the last failure unchanged.
pub async fn run_with_retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    retriable: P,
    mut operation: F,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let attempts_left = policy.max_attempts.saturating_sub(attempt + 1);
                if attempts_left == 0 || !retriable(&err) {
                    if attempts_left == 0 && retriable(&err) {
                        warn!(%label, attempts = attempt + 1, "retry budget exhausted: {err}");
                    }
                    return Err(err);
                }

                let delay = policy.delay_for(attempt);
                debug!(
                    %label,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "transient failure, retrying: {err}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32, jitter: bool) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            exponential_base: 2.0,
            jitter_enabled: jitter,
        }
    }

    #[test]
    fn delay_law_doubles_then_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter_enabled: false,
        };

        assert_eq!(policy.base_delay(0), Duration::from_secs(1));
        assert_eq!(policy.base_delay(1), Duration::from_secs(2));
        assert_eq!(policy.base_delay(2), Duration::from_secs(4));
        // 2^10 = 1024s exceeds the 60s ceiling
        assert_eq!(policy.base_delay(10), Duration::from_secs(60));
    }

    #[test]
    fn jittered_delay_stays_in_half_open_band() {
        let policy = fast_policy(3, true);
        let base = policy.base_delay(2).as_secs_f64();
        for _ in 0..200 {
            let d = policy.delay_for(2).as_secs_f64();
            assert!(d >= base * 0.5, "delay {d} below lower bound");
            assert!(d < base * 1.5, "delay {d} at or above upper bound");
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            run_with_retry(&fast_policy(3, false), "test", |_| true, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("timeout".to_string())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_failure() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            run_with_retry(&fast_policy(3, false), "test", |_| true, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {n}")) }
            })
            .await;

        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retriable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            run_with_retry(&fast_policy(5, false), "test", |_| false, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("rejected".to_string()) }
            })
            .await;

        assert_eq!(result.unwrap_err(), "rejected");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_attempt_policy_never_sleeps() {
        let result: Result<(), String> =
            run_with_retry(&fast_policy(1, false), "test", |_| true, || async {
                Err("timeout".to_string())
            })
            .await;

        assert!(result.is_err());
    }
}
