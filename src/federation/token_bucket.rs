//! Per-host token-bucket limiter for outbound delivery (§4.6 Delivery
//! Pool: "Per-destination rate limiting (token bucket keyed by host)").
//!
//! Distinct from the inbound sliding-window limiter: delivery wants tokens
//! to refill continuously rather than reset in one jump at a window
//! boundary, so a single destination with bursty outbox activity doesn't
//! get hard-cut mid-window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub struct TokenBucketConfig {
    /// Maximum tokens (and therefore maximum burst) per host.
    pub capacity: u32,
    /// Time to refill one token.
    pub refill_interval: Duration,
}

impl Default for TokenBucketConfig {
    fn default() -> Self {
        TokenBucketConfig {
            capacity: 5,
            refill_interval: Duration::from_millis(500),
        }
    }
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity: u32) -> Self {
        Bucket {
            tokens: capacity as f64,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, cfg: &TokenBucketConfig) {
        let elapsed = self.last_refill.elapsed();
        let interval = cfg.refill_interval.as_secs_f64();
        if interval <= 0.0 {
            self.tokens = cfg.capacity as f64;
            return;
        }
        let generated = elapsed.as_secs_f64() / interval;
        if generated > 0.0 {
            self.tokens = (self.tokens + generated).min(cfg.capacity as f64);
            self.last_refill = Instant::now();
        }
    }
}

/// Keyed by destination host (not full inbox URL), so two actors on the
/// same remote instance share one budget.
pub struct TokenBucket {
    cfg: TokenBucketConfig,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl TokenBucket {
    pub fn new(cfg: TokenBucketConfig) -> Self {
        TokenBucket {
            cfg,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Waits until a token is available for `host`, consumes it, and
    /// returns. Polls in increments of one refill period rather than
    /// sleeping for the whole deficit at once, so a faster-than-expected
    /// refill (clock jitter aside) is still picked up promptly.
    pub async fn acquire(&self, host: &str) {
        loop {
            {
                let mut buckets = self.buckets.lock().await;
                let bucket = buckets
                    .entry(host.to_string())
                    .or_insert_with(|| Bucket::new(self.cfg.capacity));
                bucket.refill(&self.cfg);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
            }
            tokio::time::sleep(self.cfg.refill_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_grants_full_capacity_without_waiting() {
        let bucket = TokenBucket::new(TokenBucketConfig {
            capacity: 3,
            refill_interval: Duration::from_secs(60),
        });

        let start = Instant::now();
        bucket.acquire("example.com").await;
        bucket.acquire("example.com").await;
        bucket.acquire("example.com").await;
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn separate_hosts_have_independent_budgets() {
        let bucket = TokenBucket::new(TokenBucketConfig {
            capacity: 1,
            refill_interval: Duration::from_secs(60),
        });

        let start = Instant::now();
        bucket.acquire("a.example").await;
        bucket.acquire("b.example").await;
        assert!(start.elapsed() < Duration::from_millis(200));
    }
}
