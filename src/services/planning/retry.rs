//! Retry with exponential backoff
//!
//! Runs an async operation under an optional `RetryPolicy`: up to
//! `max_retries` retries after the first attempt, sleeping
//! `backoff_ms * backoff_multiplier^(n-1)` before retry `n`.

use std::fmt::Display;
use std::future::Future;

use crate::models::plan::RetryPolicy;

/// Execute `op` with retries, returning the final outcome and the number of
/// attempts made.
///
/// `op` receives the 1-based attempt number. Without a policy the
/// operation runs exactly once.
pub async fn execute_with_retry<T, E, F, Fut>(
    policy: Option<&RetryPolicy>,
    label: &str,
    mut op: F,
) -> (Result<T, E>, u32)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_retries = policy.map(|p| p.max_retries).unwrap_or(0);
    let mut attempt: u32 = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return (Ok(value), attempt),
            Err(e) => {
                let Some(policy) = policy.filter(|_| attempt <= max_retries) else {
                    if attempt > 1 {
                        tracing::warn!(
                            "[Retry] {} failed after {} attempts: {}",
                            label,
                            attempt,
                            e
                        );
                    }
                    return (Err(e), attempt);
                };

                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    "[Retry] {} attempt {}/{} failed: {}; retrying in {:?}",
                    label,
                    attempt,
                    max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
