use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

/// Retry schedule for model calls.
///
/// `max_retries` is the total number of attempts, so a value of 3 issues at
/// most three requests. The pause between attempts is the same every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
    /// Upper bound for a single attempt, connect through body.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Pause before the attempt following `_attempt`. Constant, no backoff.
    #[must_use]
    pub fn delay_after(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Run `f` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are spent. `f` receives the 1-based attempt number.
///
/// # Errors
///
/// Returns the last error seen once attempts are exhausted, or the first
/// non-retryable error.
pub(crate) async fn with_retry<T, F, Fut>(
    provider_name: &str,
    policy: &RetryPolicy,
    mut f: F,
) -> Result<T, LlmError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let attempts = policy.attempts();
    let mut last_error = LlmError::NetworkFailure("no attempt made".into());

    for attempt in 1..=attempts {
        match f(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if attempt < attempts {
                    let delay = policy.delay_after(attempt);
                    tracing::warn!(
                        provider = provider_name,
                        attempt,
                        attempts,
                        error = %e,
                        "model call failed, retrying in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    tracing::error!(
                        provider = provider_name,
                        attempts,
                        error = %e,
                        "model call failed, retries exhausted"
                    );
                }
                last_error = e;
            }
        }
    }

    Err(last_error)
}
