//! Bounded exponential-backoff retry for fallible async operations.
//!
//! The executor never propagates the operation's error: callers receive
//! `Some(value)` on success or `None` once every attempt has failed.
//!
//! ```text
//! attempt 1 --fail--> sleep base^1 --> attempt 2 --fail--> sleep base^2 --> attempt 3 --fail--> None
//! ```

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// Retry configuration with exponential backoff.
///
/// Delay after failed attempt `n` (1-indexed) is `base_delay ^ n` seconds,
/// so a 2s base yields 2s, 4s, 8s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay.
    pub max_delay: Duration,
    /// Bound on a single attempt. `None` lets an attempt run as long as the
    /// underlying client allows.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
            attempt_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay before the attempt following failed attempt `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let secs = self
            .base_delay
            .as_secs_f64()
            .powi(attempt.min(i32::MAX as u32) as i32);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Run `operation` under `policy`, logging every attempt.
///
/// Returns `None` after the last allowed attempt fails.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, description: &str, mut operation: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let max_attempts = policy.attempts();

    for attempt in 1..=max_attempts {
        tracing::debug!(%description, attempt, max_attempts, "Attempt started");

        let result = match policy.attempt_timeout {
            Some(limit) => match tokio::time::timeout(limit, operation()).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Timeout(limit.as_secs())),
            },
            None => operation().await,
        };

        let error = match result {
            Ok(value) => return Some(value),
            Err(e) => e,
        };

        if attempt == max_attempts {
            tracing::error!(
                %description,
                error = %error,
                "{description} failed after {max_attempts} attempts"
            );
            return None;
        }

        let delay = policy.delay_for_attempt(attempt);
        tracing::warn!(
            %description,
            attempt,
            max_attempts,
            error = %error,
            "[Retry {attempt}/{max_attempts}] {description} failed. Retrying in {}s",
            delay.as_secs_f64()
        );
        tokio::time::sleep(delay).await;
    }

    None
}
