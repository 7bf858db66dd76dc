//! Outbound send-rate limiter.
//!
//! Token bucket with continuous, fractional refill: tokens accrue on every
//! call in proportion to the elapsed time, never in per-second steps, so there
//! is no burst at window boundaries. The limiter paces; it never admits or
//! drops work. A failed acquisition means "hold the batch for the next tick".

use std::time::Instant;

#[derive(Debug)]
pub struct RateLimiter {
    /// Tokens per second. 0 = paused.
    rate: u32,
    capacity: f64,
    tokens: f64,
    last: Instant,
}

impl RateLimiter {
    /// Start with a full bucket of `burst` tokens (at least 1).
    pub fn new(rate: u32, burst: u32, now: Instant) -> Self {
        let capacity = burst.max(1) as f64;
        Self {
            rate,
            capacity,
            tokens: capacity,
            last: now,
        }
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }

    pub fn is_paused(&self) -> bool {
        self.rate == 0
    }

    /// Take `n` tokens if available. Every admitted unit costs one token, so
    /// a request above the capacity never succeeds; callers size their
    /// requests with [`RateLimiter::capacity`].
    pub fn try_acquire(&mut self, n: u32, now: Instant) -> bool {
        if self.is_paused() {
            return false;
        }
        self.refill(now);

        let cost = n.max(1) as f64;
        if self.tokens + f64::EPSILON >= cost {
            self.tokens = (self.tokens - cost).max(0.0);
            true
        } else {
            false
        }
    }

    /// Change the ceiling. Tokens accrued at the old rate are settled first
    /// and kept.
    pub fn set_limit(&mut self, rate: u32, now: Instant) {
        self.refill(now);
        self.rate = rate;
        tracing::debug!(rate, tokens = self.tokens, "rate limit changed");
    }

    /// Refill to capacity (used by emergency cleanup).
    pub fn reset(&mut self, now: Instant) {
        self.tokens = self.capacity;
        self.last = now;
    }

    /// Tokens currently available.
    pub fn available(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.last = now;
        if self.rate == 0 {
            return;
        }
        self.tokens = (self.tokens + elapsed * self.rate as f64).min(self.capacity);
    }
}
