use serde::Deserialize;
use std::time::Duration;
use tokio::time::sleep;

// ============================================================================
// Bounded Retry with Exponential Backoff
// ============================================================================
//
// Retries an operation only while it fails with a retryable error, up to
// `max_attempts` total attempts. The outcome says which way it ended so the
// caller can map "ran out of attempts" differently from "failed for good".
//
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_millis(((delay.as_millis() as f64) * self.multiplier) as u64)
            .min(self.max_delay)
    }
}

/// How a retried operation ended
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    Success(T),
    /// Non-retryable failure; returned on the attempt it happened
    Failed(E),
    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, last_error: E },
}

/// Errors that are worth another attempt, e.g. an optimistic-lock conflict
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

/// `operation` receives the 1-based attempt number
pub async fn retry_on_conflict<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display + IsRetryable,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempt = attempt, "Operation succeeded after retry");
                }
                return RetryOutcome::Success(result);
            }
            Err(error) => {
                if !error.is_retryable() {
                    tracing::debug!(
                        attempt = attempt,
                        error = %error,
                        "Non-retryable failure, not retrying"
                    );
                    return RetryOutcome::Failed(error);
                }

                if attempt >= max_attempts {
                    tracing::warn!(
                        attempt = attempt,
                        error = %error,
                        "Operation failed after all retries"
                    );
                    return RetryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: error,
                    };
                }

                tracing::warn!(
                    attempt = attempt,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Retryable failure, retrying after delay"
                );

                sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}
