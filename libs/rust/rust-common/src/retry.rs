//! Bounded retries with exponential backoff.
//!
//! Upstream fetches are retried only when the failure is classified as
//! transient by [`PlatformError::is_retryable`], and never beyond the
//! configured budget. A budget of `n` means at most `n + 1` attempts.

use crate::PlatformError;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Retry budget and backoff shape.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Add up to 25% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Sets the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Makes delays deterministic.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }
}

/// Runs upstream calls under a [`RetryConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Policy for `config`.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Delay after failed attempt number `attempt` (zero-based).
    ///
    /// The initial delay doubles per attempt, is capped at the maximum, and
    /// gets its jitter after capping.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let doubled = self
            .config
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        let capped = doubled.min(self.config.max_delay);

        if self.config.jitter {
            capped.mul_f64(1.0 + rand::random::<f64>() * 0.25)
        } else {
            capped
        }
    }

    /// Whether `error` after attempt number `attempt` deserves another try.
    #[must_use]
    pub fn should_retry(&self, error: &PlatformError, attempt: u32) -> bool {
        attempt < self.config.max_retries && error.is_retryable()
    }

    /// Runs `operation` until it succeeds, fails permanently or the budget
    /// is spent.
    ///
    /// `operation_name` labels the debug events emitted between attempts.
    ///
    /// # Errors
    ///
    /// Returns the last failure.
    pub async fn execute<F, Fut, T>(
        &self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<T, PlatformError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PlatformError>>,
    {
        let mut attempt = 0;
        loop {
            let error = match operation().await {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };
            if !self.should_retry(&error, attempt) {
                return Err(error);
            }

            let delay = self.delay_for_attempt(attempt);
            debug!(
                operation = operation_name,
                attempt = attempt + 1,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Retrying upstream call"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
