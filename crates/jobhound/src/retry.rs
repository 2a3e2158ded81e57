//! Bounded retry with a fixed delay between attempts.
//!
//! LLM stages fail transiently (provider hiccups, upstream 5xx). Every
//! stage call is wrapped in the same policy: a fixed number of attempts
//! with a flat sleep in between, surfacing the last error once the
//! attempts are spent. No backoff: the free-tier quota resets on a
//! fixed clock, so waiting longer than the window buys nothing.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info};

/// Runs `op` up to `attempts` times, sleeping `delay` between failures.
///
/// Returns the first success, or the error from the final attempt. The
/// operation is a closure returning a fresh future per attempt.
pub async fn retry_fixed<T, E, F, Fut>(attempts: u32, delay: Duration, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                error!(attempt, attempts, %err, "attempt failed, retrying");
                info!(delay_secs = delay.as_secs(), "sleeping before retry");
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                error!(attempt, attempts, %err, "all attempts failed");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_returns_immediately() {
        let begin = Instant::now();
        let result: Result<i32, String> =
            retry_fixed(3, Duration::from_secs(60), || async { Ok(7) }).await;
        assert_eq!(result, Ok(7));
        assert_eq!(begin.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<&str, String> = retry_fixed(3, Duration::from_secs(60), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(format!("transient {n}"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_return_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_fixed(3, Duration::from_secs(60), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Err(format!("boom {n}")) }
        })
        .await;
        assert_eq!(result, Err("boom 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_attempts_but_not_after_last() {
        let begin = Instant::now();
        let result: Result<(), String> =
            retry_fixed(3, Duration::from_secs(60), || async { Err("nope".into()) }).await;
        assert!(result.is_err());
        // Two sleeps separate three attempts; no trailing sleep.
        assert_eq!(begin.elapsed(), Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_attempts_clamped_to_one() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = retry_fixed(0, Duration::from_secs(60), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("always".into()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
