//! Batching scheduler: turns queued envelopes into wire-sized batches.

use std::time::{Duration, Instant};

use crate::limiter::RateLimiter;
use crate::queue::{PriorityQueueSet, QueuedEnvelope};
use crate::state::ConnectionState;

#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    interval: Duration,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, interval: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_batch_size(&mut self, n: usize) {
        self.batch_size = n.max(1);
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval.max(Duration::from_millis(1));
    }

    /// One tick. Returns the batch to transmit, or `None` when the tick is a
    /// no-op: not connected, nothing queued, or the limiter says wait. In
    /// every `None` case the queue is left untouched.
    pub fn next_batch(
        &self,
        queue: &mut PriorityQueueSet,
        limiter: &mut RateLimiter,
        state: ConnectionState,
        now: Instant,
    ) -> Option<Vec<QueuedEnvelope>> {
        if state != ConnectionState::Connected || queue.is_empty() {
            return None;
        }
        // Never more envelopes than the bucket can pay for.
        let want = self
            .batch_size
            .min(queue.len())
            .min(limiter.capacity() as usize);
        if !limiter.try_acquire(want as u32, now) {
            return None;
        }
        Some(queue.drain(want))
    }
}
