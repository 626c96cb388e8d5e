//! Subprocess Retry Policy
//!
//! Exponential backoff retry for analysis processes that exit non-zero.
//! The pipeline itself never retries; a [`RetryingRunner`] is composed around
//! the process runner at construction time when `retry.max_attempts > 1`.

use crate::error::StageError;
use crate::services::process_runner::ProcessRunner;
use crate::utils::duration_ms;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Retry settings
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (1 = no retry)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Backoff cap
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(2000),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Retry an operation with exponential backoff while it fails with a retryable error
///
/// **Algorithm:**
/// 1. Attempt operation
/// 2. If successful, return result
/// 3. If the error is retryable ([`StageError::is_retryable`]) and attempts remain:
///    log WARN, sleep, double the backoff (capped), retry
/// 4. Otherwise return the error unchanged
///
/// # Arguments
/// * `operation_name` - Name for logging (e.g., "embedding extraction")
/// * `policy` - Attempt budget and backoff bounds
/// * `operation` - Async closure performing one attempt
pub async fn retry_on_process_failure<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, StageError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StageError>>,
{
    let start_time = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = policy.initial_backoff.min(policy.max_backoff);
    let mut attempt = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying analysis process");
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = duration_ms(start_time.elapsed()),
                        "Analysis process succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }

                if attempt >= max_attempts {
                    if max_attempts > 1 {
                        tracing::error!(
                            operation = operation_name,
                            attempt,
                            elapsed_ms = duration_ms(start_time.elapsed()),
                            error = %err,
                            "Analysis process failed: retry attempts exhausted"
                        );
                    }
                    return Err(err);
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = duration_ms(backoff),
                    error = %err,
                    "Analysis process failed, will retry after backoff"
                );

                tokio::time::sleep(backoff).await;

                backoff = (backoff * 2).min(policy.max_backoff);
            }
        }
    }
}

/// Process runner decorator applying a [`RetryPolicy`]
pub struct RetryingRunner {
    inner: Arc<dyn ProcessRunner>,
    policy: RetryPolicy,
}

impl RetryingRunner {
    pub fn new(inner: Arc<dyn ProcessRunner>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl ProcessRunner for RetryingRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<String, StageError> {
        let operation_name = program.display().to_string();
        retry_on_process_failure(&operation_name, &self.policy, || {
            self.inner.run(program, args)
        })
        .await
    }
}
