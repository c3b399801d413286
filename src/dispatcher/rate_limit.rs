//! Token-bucket rate limiting shared by the dispatcher and remediation
//! engine (spec §4.4, §4.5).

use std::sync::Mutex;
use std::time::Instant;

struct State {
    tokens: f64,
    last_refill: Instant,
}

/// A token bucket refilled continuously at `rate_per_hour / 3600` tokens per
/// second, capped at `burst`.
pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<State>,
}

impl TokenBucket {
    pub fn new(rate_per_hour: u32, burst: u32) -> Self {
        let capacity = burst.max(1) as f64;
        Self {
            capacity,
            refill_per_second: rate_per_hour as f64 / 3600.0,
            state: Mutex::new(State {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Attempts to consume one token. Returns `true` if a token was
    /// available.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_second).min(self.capacity);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_one_allows_exactly_one_immediate_send() {
        let bucket = TokenBucket::new(1, 1);
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[test]
    fn capacity_caps_accumulation() {
        let bucket = TokenBucket::new(3600, 2);
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }
}
