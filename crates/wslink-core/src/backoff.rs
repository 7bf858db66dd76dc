//! Reconnect backoff policy.
//!
//! `delay(n) = min(max, base * 2^n + U[0, jitter * base * 2^n])`.
//! With `jitter <= 1` every draw for attempt `n` is at most `2 * base * 2^n`,
//! the floor of attempt `n + 1`, so delays never decrease between consecutive
//! attempts, whatever the random draws, and stick at `max` once reached.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    jitter: f64,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, jitter: f64) -> Self {
        let base = base.max(Duration::from_millis(1));
        Self {
            base,
            max: max.max(base),
            jitter: jitter.clamp(0.0, 1.0),
        }
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    /// Delay before retry number `attempt` (0-based), jittered with `thread_rng`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with(attempt, &mut rand::thread_rng())
    }

    pub fn delay_with<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let sample = if self.jitter > 0.0 {
            rng.gen_range(0.0..=1.0)
        } else {
            0.0
        };
        self.delay_for(attempt, sample)
    }

    /// Deterministic core of [`Backoff::delay`]; `sample` in `[0, 1]`.
    pub fn delay_for(&self, attempt: u32, sample: f64) -> Duration {
        let max_ms = self.max.as_millis() as f64;
        // 2^n overflows long before the cap matters; stop doubling early.
        let exp = 2f64.powi(attempt.min(62) as i32);
        let step_ms = (self.base.as_millis() as f64 * exp).min(max_ms);
        let jitter_ms = step_ms * self.jitter * sample.clamp(0.0, 1.0);
        Duration::from_millis((step_ms + jitter_ms).min(max_ms) as u64)
    }
}
