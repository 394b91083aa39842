// ABOUTME: Bounded exponential backoff for cluster adapter calls.
// ABOUTME: Only Unreachable errors are retried; rejections surface immediately.

use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::cluster::ClusterError;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);

/// How often and how patiently to retry an unreachable cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero behaves like one.
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub initial_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, ClusterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClusterError>>,
    {
        self.run_before(operation, None, op).await
    }

    /// Like [`run`](Self::run), but no backoff sleeps past `deadline` and no
    /// retry starts once it has passed.
    pub async fn run_before<T, F, Fut>(
        &self,
        operation: &str,
        deadline: Option<Instant>,
        mut op: F,
    ) -> Result<T, ClusterError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClusterError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let mut delay = self.backoff(attempt);
                    if let Some(deadline) = deadline {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            tracing::warn!(
                                operation,
                                attempts = attempt,
                                error = %e,
                                "deadline reached, not retrying"
                            );
                            return Err(e);
                        }
                        delay = delay.min(remaining);
                    }
                    tracing::debug!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying cluster call"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::warn!(
                            operation,
                            attempts = attempt,
                            error = %e,
                            "retries exhausted"
                        );
                    }
                    return Err(e);
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}
