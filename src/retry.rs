//! Bounded retry with exponential backoff for calls to unreliable
//! collaborators.
//!
//! One policy shared by the transcript fetch, generation and publish call
//! sites. Failures are classified through `PipelineError::class`: terminal
//! errors (auth, rate limit) short-circuit immediately, transient errors are
//! retried until the attempt budget runs out, and exhaustion returns the last
//! underlying error rather than a synthesized wrapper that would hide the
//! root cause.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ErrorClass, PipelineError};

/// Retry policy for a fallible operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first try (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff unit in milliseconds; attempt k waits base * 2^(k-1) before
    /// attempt k+1 (default: 1000)
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds (default: 60000)
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    60_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following attempt `attempt` (1-indexed):
    /// base * 2^(attempt-1), capped at `max_delay_ms`.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Whether another attempt is allowed after `attempt` attempts
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Run `op` under the retry policy.
///
/// `op` is invoked at least once; attempt 1 is not a retry. A terminal error
/// is returned immediately without sleeping.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut op: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if err.class() == ErrorClass::Terminal {
                    return Err(err);
                }

                if !policy.should_retry(attempt) {
                    return Err(err);
                }

                let delay = policy.delay_after_attempt(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
