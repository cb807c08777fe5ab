//! Token-bucket rate limiter for request generation.
//!
//! Configured with burst = rate and refill = rate/second, so a generator may
//! emit up to one second of requests instantly but never exceeds the target
//! rate in the long run.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// An async token bucket.
///
/// Only the request generator waits on the limiter, so contention on the
/// internal lock is not a concern.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    /// Creates a limiter for `rate_per_sec` requests/second with an equal
    /// burst, or `None` when the rate is zero (unlimited).
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // configured rates are far below 2^52
    pub fn new(rate_per_sec: u64) -> Option<Self> {
        if rate_per_sec == 0 {
            return None;
        }
        let rate = rate_per_sec as f64;
        Some(Self {
            rate,
            burst: rate,
            state: Mutex::new(BucketState {
                tokens: rate,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Waits until one token is available and consumes it.
    ///
    /// Returns early (without a token) when `ctx` is cancelled.
    pub async fn wait(&self, ctx: &CancellationToken) {
        loop {
            let sleep_for = {
                let mut state = self.state.lock();
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.rate)
            };

            tokio::select! {
                () = tokio::time::sleep(sleep_for) => {}
                () = ctx.cancelled() => return,
            }
        }
    }
}
