//! Retry with exponential backoff for transient provider failures

use std::time::Duration;

use tracing::warn;

use crate::error::Result;

/// Execute an async operation with exponential backoff retry.
///
/// Only transient errors (throttling, 5xx, transport) are retried; anything
/// else returns immediately. Delay starts at one second, doubles per
/// attempt, and is capped at 30 seconds.
pub async fn with_retry<T, F, Fut>(operation_name: &str, max_retries: u32, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut delay = Duration::from_secs(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_transient() && attempts <= max_retries => {
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name,
                    attempts,
                    max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }
            Err(e) => return Err(e),
        }
    }
}
