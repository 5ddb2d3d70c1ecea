//! Token-bucket throttle for calls to the generation service.
//!
//! The bucket holds up to `burst` tokens and gains one every `interval`. A
//! zero interval disables throttling entirely. Time comes from
//! `tokio::time`, so tests run it under a paused clock.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    burst: u32,
    interval: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// A bucket that starts full with `burst` tokens (at least one).
    pub fn new(burst: u32, interval: Duration) -> Self {
        let burst = burst.max(1);
        Self {
            burst,
            interval,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Wait until a token is available and take it.
    ///
    /// Waiters are served in arrival order because the bucket lock is held
    /// while sleeping.
    pub async fn acquire(&self) {
        if self.interval.is_zero() {
            return;
        }
        let mut bucket = self.bucket.lock().await;
        loop {
            self.refill(&mut bucket);
            if bucket.tokens > 0 {
                bucket.tokens -= 1;
                return;
            }
            let wait = self
                .interval
                .saturating_sub(Instant::now().saturating_duration_since(bucket.last_refill));
            debug!(wait_ms = wait.as_millis() as u64, "Rate limiter waiting for a token");
            sleep(wait).await;
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let earned = (elapsed.as_nanos() / self.interval.as_nanos()).min(u128::from(self.burst)) as u32;
        if earned == 0 {
            return;
        }
        bucket.tokens = bucket.tokens.saturating_add(earned).min(self.burst);
        if bucket.tokens == self.burst {
            bucket.last_refill = now;
        } else {
            bucket.last_refill += self.interval * earned;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate_then_spaced() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        let t0 = Instant::now();

        limiter.acquire().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);

        limiter.acquire().await;
        assert!(t0.elapsed() >= Duration::from_secs(10));

        limiter.acquire().await;
        assert!(t0.elapsed() >= Duration::from_secs(20));
        assert!(t0.elapsed() < Duration::from_secs(21));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_allows_back_to_back_calls() {
        let limiter = RateLimiter::new(3, Duration::from_secs(5));
        let t0 = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(t0.elapsed(), Duration::ZERO);

        limiter.acquire().await;
        assert!(t0.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_time_refills_up_to_burst_only() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        limiter.acquire().await;
        limiter.acquire().await;

        tokio::time::advance(Duration::from_secs(60)).await;
        let t0 = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);

        limiter.acquire().await;
        assert!(t0.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_waits() {
        let limiter = RateLimiter::new(1, Duration::ZERO);
        let t0 = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert_eq!(t0.elapsed(), Duration::ZERO);
    }
}
