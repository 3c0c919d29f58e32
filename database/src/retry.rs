use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::sleep;

/// Runs `operation` until it succeeds, fails with an error `is_transient`
/// rejects, or `max_retries` extra attempts are used up. The delay doubles
/// after every failed attempt.
pub async fn retry_with_backoff<F, T, E>(
    mut operation: F,
    is_transient: impl Fn(&E) -> bool,
    max_retries: usize,
    initial_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Pin<Box<dyn Future<Output = Result<T, E>> + Send>>,
    E: std::fmt::Display,
{
    let mut delay = initial_delay;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries && is_transient(&e) => {
                attempt += 1;
                tracing::warn!(
                    attempt,
                    max_retries,
                    error = %e,
                    ?delay,
                    "Attempt failed, retrying"
                );
                sleep(delay).await;
                delay *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
