//! Retry with exponential backoff.
//!
//! The bound is purely attempt-based; each underlying call carries its own
//! request timeout. Delays are not jittered.

use common::config::RetryConfig;
use common::Error;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How many times to try, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the wait after every failed attempt.
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            initial_delay,
            backoff_factor,
        }
    }

    /// Fixed 5 s interval, 3 attempts. Used by views that re-request a
    /// resource after the backend reported it was still processing.
    pub fn page_level() -> Self {
        Self::new(3, Duration::from_secs(5), 1.0)
    }

    /// A single attempt.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    fn factor(&self) -> f64 {
        if self.backoff_factor.is_finite() && self.backoff_factor > 0.0 {
            self.backoff_factor
        } else {
            1.0
        }
    }

    /// The waits between consecutive attempts, in order.
    pub fn delays(&self) -> Vec<Duration> {
        let mut delay = self.initial_delay;
        (1..self.attempts())
            .map(|_| {
                let current = delay;
                delay = delay.mul_f64(self.factor());
                current
            })
            .collect()
    }

    /// Run `op` until it succeeds, a non-retryable error occurs, the attempts
    /// run out, or `cancel` fires.
    ///
    /// Exhaustion yields `Error::ExhaustedRetries` wrapping the last failure.
    /// Cancellation is observed during an attempt and during the backoff wait,
    /// and no further attempt is started once it has fired.
    pub async fn run<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let max_attempts = self.attempts();
        let mut attempt: u32 = 0;
        let mut delay = self.initial_delay;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            attempt += 1;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                r = op() => r,
            };

            let err = match outcome {
                Ok(v) => {
                    if attempt > 1 {
                        debug!("Succeeded on attempt {}/{}", attempt, max_attempts);
                    }
                    return Ok(v);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            warn!("Attempt {}/{} failed: {}", attempt, max_attempts, err);

            if attempt >= max_attempts {
                return Err(Error::ExhaustedRetries {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            delay = delay.mul_f64(self.factor());
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        Self::new(cfg.max_attempts, cfg.initial_delay(), cfg.backoff_factor)
    }
}
