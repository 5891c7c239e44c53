//! Exponential backoff for oracle calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

/// How often, and how patiently, a failing call is repeated.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first; 0 behaves like 1
    pub max_attempts: u32,
    /// Wait before the second attempt
    pub initial_delay: Duration,
    /// Ceiling for any single wait
    pub max_delay: Duration,
    /// Growth factor between consecutive waits
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Three attempts with 2s then 4s waits; Gemini rate limits clear slowly.
    pub fn oracle_call() -> Self {
        Self::new(3, Duration::from_secs(2)).with_max_delay(Duration::from_secs(10))
    }

    /// Waits before each retry, in order. Yields `max_attempts - 1` values.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        let initial_ms = self.initial_delay.as_millis() as f64;
        (0..self.max_attempts.max(1) - 1).map(move |retry| {
            let ms = initial_ms * self.backoff_multiplier.powi(retry as i32);
            Duration::from_millis(ms as u64).min(self.max_delay)
        })
    }
}

/// Run `operation`, repeating it after each failure that `should_retry`
/// accepts until the policy runs out of attempts. The last error is returned.
pub async fn with_retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let attempts = policy.max_attempts.max(1);
    let mut delays = policy.delays();
    let mut attempt = 1;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}/{}", label, attempt, attempts);
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !should_retry(&error) {
            debug!("{} failed with a permanent error: {}", label, error);
            return Err(error);
        }

        let Some(delay) = delays.next() else {
            warn!("{} gave up after {} attempts: {}", label, attempts, error);
            return Err(error);
        };

        warn!(
            "{} attempt {}/{} failed ({}), retrying in {:?}",
            label, attempt, attempts, error, delay
        );
        sleep(delay).await;
        attempt += 1;
    }
}
