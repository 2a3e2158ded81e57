//! Fixed-window rate limiter for the LLM request budget.
//!
//! Free-tier chat APIs enforce a requests-per-minute quota. The limiter
//! counts requests against a window; once the count reaches the cap it
//! sleeps out the remainder of the window and starts a fresh one. Callers
//! `record` after each request (or batch), which blocks when the budget
//! is spent.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::info;

/// Shared fixed-window request counter.
///
/// Holding the internal lock across the sleep is intentional: concurrent
/// callers queue behind the exhausted window instead of racing the reset.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

struct WindowState {
    used: u32,
    window_start: Instant,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Mutex::new(WindowState {
                used: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// Counts `count` requests against the window, then waits if the
    /// budget is now spent.
    pub async fn record(&self, count: u32) {
        {
            let mut state = self.state.lock().await;
            state.used = state.used.saturating_add(count);
        }
        self.wait_if_needed().await;
    }

    /// Sleeps out the current window if the budget is exhausted.
    ///
    /// A window that has already elapsed is reset without waiting, even
    /// when its count was over the cap.
    pub async fn wait_if_needed(&self) {
        let mut state = self.state.lock().await;
        let elapsed = state.window_start.elapsed();

        if elapsed > self.window {
            state.used = 0;
            state.window_start = Instant::now();
            return;
        }

        if state.used >= self.max_requests {
            let wait = self.window - elapsed;
            if !wait.is_zero() {
                info!(
                    used = state.used,
                    max = self.max_requests,
                    wait_secs = wait.as_secs_f64(),
                    "rate limit reached, waiting out window"
                );
                sleep(wait).await;
            }
            state.used = 0;
            state.window_start = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_under_budget_never_waits() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        let begin = Instant::now();
        limiter.record(1).await;
        limiter.record(1).await;
        assert_eq!(begin.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_sleeps_out_window() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let begin = Instant::now();
        limiter.record(2).await;
        assert!(begin.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_resets_after_sleep() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        limiter.record(2).await; // sleeps 60s, resets

        let begin = Instant::now();
        limiter.record(1).await; // fresh window, under budget
        assert_eq!(begin.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_window_resets_without_wait() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        limiter.record(1).await;
        tokio::time::advance(Duration::from_secs(61)).await;

        let begin = Instant::now();
        // The stale window is discarded, so even an over-cap count
        // does not block here.
        limiter.record(5).await;
        assert_eq!(begin.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_window_waits_remainder_only() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        tokio::time::advance(Duration::from_secs(45)).await;

        let begin = Instant::now();
        limiter.record(1).await;
        assert_eq!(begin.elapsed(), Duration::from_secs(15));
    }
}
