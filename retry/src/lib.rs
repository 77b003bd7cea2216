//! Bounded exponential backoff with optional jitter.
//!
//! Every call that crosses a process boundary (completion API, encoder,
//! relational store) goes through [`execute`] with a named
//! [`RetryPolicy`]. The executor is an explicit higher-order function:
//! it takes the operation as a closure and a policy, and returns the
//! operation's result or the final attempt's error unmodified.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

/// Backoff parameters for one class of upstream.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Number of retries after the initial attempt.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Upper bound on any single delay.
    pub max_delay: Duration,

    /// Multiplier applied per retried attempt.
    pub backoff_multiplier: f64,

    /// Perturb each delay by a uniform ±25%.
    pub jitter: bool,
}

impl RetryPolicy {
    /// Policy for completion-API calls: few retries, jittered.
    /// These calls are expensive and slow, so we give up early.
    pub fn completion_api() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    /// Policy for relational/cache store calls: more retries, no
    /// jitter. Store failures are cheap and usually transient.
    pub fn datastore() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    /// Lighter policy for generic external calls (image hosts etc.).
    pub fn external() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    /// Set the number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Disable jitter.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Delay before retried attempt `attempt` (0-indexed over retries):
    /// `min(initial * multiplier^attempt, max)`, optionally perturbed
    /// by uniform jitter in ±25%, floored at zero.
    fn delay_for(&self, attempt: u32) -> Duration {
        let base = (self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt as i32))
        .min(self.max_delay.as_secs_f64());

        let delayed = if self.jitter {
            let spread = base * 0.25;
            base + rand::rng().random_range(-spread..=spread)
        } else {
            base
        };

        Duration::from_secs_f64(delayed.max(0.0))
    }
}

/// Run `operation` under `policy`.
///
/// The operation is invoked at most `max_retries + 1` times. No delay
/// follows the final attempt; its error is returned unmodified so
/// callers can distinguish a genuine failure from an exhausted
/// transient one.
pub async fn execute<T, E, F, Fut>(mut operation: F, policy: &RetryPolicy) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("operation succeeded after {attempt} retries");
                }
                return Ok(value);
            }
            Err(err) => {
                if attempt == policy.max_retries {
                    warn!("operation failed after {} attempts: {err}", attempt + 1);
                    return Err(err);
                }

                let delay = policy.delay_for(attempt);
                warn!(
                    "operation failed (attempt {}), retrying in {delay:?}: {err}",
                    attempt + 1
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn immediate_success_runs_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<u32, String> = execute(
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                }
            },
            &fast_policy(3),
        )
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_on_final_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<u32, String> = execute(
            move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 3 {
                        Err(format!("transient {n}"))
                    } else {
                        Ok(42)
                    }
                }
            },
            &fast_policy(3),
        )
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhaustion_returns_final_error_unmodified() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<u32, String> = execute(
            move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    Err(format!("boom {n}"))
                }
            },
            &fast_policy(3),
        )
        .await;

        // maxRetries + 1 invocations, last error passed through.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(result, Err("boom 3".to_string()));
    }

    #[test]
    fn delay_grows_then_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: false,
        };

        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(10));
        assert_eq!(policy.delay_for(5), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_quarter_band() {
        let policy = RetryPolicy {
            max_retries: 1,
            initial_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        };

        for _ in 0..100 {
            let delay = policy.delay_for(0).as_secs_f64();
            assert!((3.0..=5.0).contains(&delay), "delay {delay} out of band");
        }
    }

    #[test]
    fn named_policies_match_upstream_classes() {
        assert_eq!(RetryPolicy::completion_api().max_retries, 3);
        assert!(RetryPolicy::completion_api().jitter);
        assert_eq!(RetryPolicy::datastore().max_retries, 5);
        assert!(!RetryPolicy::datastore().jitter);
        assert_eq!(RetryPolicy::external().max_retries, 2);
    }
}
