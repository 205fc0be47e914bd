//! The optional per-worker token bucket: bytes/sec with a burst
//! of 3x the configured rate. Acquiring rate tokens always happens *before*
//! acquiring a concurrency permit, so
//! a caller waiting on bandwidth never occupies a permit slot.

use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct TokenBucket {
    rate_per_sec: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_bytes_per_sec: u64) -> Self {
        let rate = rate_bytes_per_sec as f64;
        Self {
            rate_per_sec: rate,
            burst: rate * 3.0,
            state: Mutex::new(BucketState {
                tokens: rate * 3.0,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Blocks (async) until `bytes` tokens are available, refilling by
    /// elapsed-time at `rate_per_sec` on every poll.
    pub async fn acquire(&self, bytes: u64) {
        let mut bytes = bytes as f64;
        if bytes <= 0.0 {
            return;
        }
        loop {
            let wait = {
                let mut state = self.state.lock().unwrap();
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.burst);
                state.last_refill = now;

                if state.tokens >= bytes {
                    state.tokens -= bytes;
                    bytes = 0.0;
                    None
                } else {
                    let deficit = bytes - state.tokens;
                    state.tokens = 0.0;
                    bytes = deficit;
                    Some(Duration::from_secs_f64((deficit / self.rate_per_sec).min(1.0).max(0.001)))
                }
            };
            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn burst_allows_immediate_consumption_up_to_3x_rate() {
        let bucket = TokenBucket::new(100);
        let start = Instant::now();
        bucket.acquire(300).await;
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn exceeding_burst_blocks_for_remainder() {
        let bucket = TokenBucket::new(1_000_000);
        bucket.acquire(3_000_000).await; // drain the burst
        let start = Instant::now();
        bucket.acquire(500_000).await;
        assert!(start.elapsed() >= Duration::from_millis(400));
    }
}
