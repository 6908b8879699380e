//! Bounded retries with a per-call timeout for directory calls.

use std::future::Future;
use std::time::Duration;

use rollcall_directory::{DirectoryError, DirectoryOperation};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// How directory calls are bounded and repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, including the first. Zero behaves like one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub backoff: Duration,
    /// Cap on the delay between retries.
    pub max_backoff: Duration,
    /// Upper bound for each attempt.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    #[must_use]
    pub fn single_attempt(call_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            call_timeout,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1 for the first retry).
    fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

/// Runs `call` under `policy`.
///
/// Every attempt is bounded by `policy.call_timeout`; an expired attempt is
/// reported as [`DirectoryError::Timeout`]. A failed attempt is repeated only
/// while `should_retry` accepts the error and attempts remain. The last error
/// is returned once attempts are exhausted.
pub async fn call_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: DirectoryOperation,
    should_retry: fn(&DirectoryError) -> bool,
    mut call: F,
) -> Result<T, DirectoryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DirectoryError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = match timeout(policy.call_timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(DirectoryError::Timeout {
                timeout_ms: u64::try_from(policy.call_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(%operation, attempt, "Directory call succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if attempt < attempts && should_retry(&error) => {
                let delay = policy.delay(attempt);
                warn!(
                    %operation,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "Directory call failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
