//! Priority queue set: four FIFO tiers with a shared capacity.
//!
//! Eviction on a full set is bottom-up: the oldest envelope of the least
//! important non-empty tier goes first, as long as that tier does not outrank
//! the newcomer. The critical tier is never evicted; when nothing can make
//! room the newcomer itself is rejected. Both cases are handed back to the
//! caller so they end up in diagnostics instead of vanishing.

use std::collections::VecDeque;
use std::time::Instant;

use serde::Serialize;

use crate::protocol::envelope::{Envelope, Priority};

/// An envelope resident in the set, plus when it entered the set.
#[derive(Debug, Clone)]
pub struct QueuedEnvelope {
    pub envelope: Envelope,
    pub enqueued_at: Instant,
}

/// Result of an enqueue (or requeue) under the capacity rule.
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    Accepted,
    /// Accepted after evicting this older, less important envelope.
    Evicted(Envelope),
    /// Nothing could make room; the incoming envelope was dropped.
    Rejected(Envelope),
}

/// Per-priority resident counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    pub critical: usize,
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

impl QueueDepth {
    pub fn total(&self) -> usize {
        self.critical + self.high + self.normal + self.low
    }

    pub fn get(&self, p: Priority) -> usize {
        match p {
            Priority::Critical => self.critical,
            Priority::High => self.high,
            Priority::Normal => self.normal,
            Priority::Low => self.low,
        }
    }
}

#[derive(Debug)]
pub struct PriorityQueueSet {
    tiers: [VecDeque<QueuedEnvelope>; 4],
    capacity: usize,
    len: usize,
}

impl PriorityQueueSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            tiers: Default::default(),
            capacity: capacity.max(1),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append at the back of the envelope's tier.
    pub fn enqueue(&mut self, envelope: Envelope, now: Instant) -> EnqueueOutcome {
        self.insert(
            QueuedEnvelope {
                envelope,
                enqueued_at: now,
            },
            false,
        )
    }

    /// Put previously drained items back at the front of their tiers.
    ///
    /// `items` must be in their original send order; that order is kept, and
    /// all of them land ahead of anything still queued in the same tier.
    pub fn requeue_front(&mut self, items: Vec<QueuedEnvelope>) -> Vec<EnqueueOutcome> {
        let mut outcomes: Vec<EnqueueOutcome> = items
            .into_iter()
            .rev()
            .map(|item| self.insert(item, true))
            .collect();
        outcomes.reverse();
        outcomes
    }

    /// Pull up to `max` envelopes, most important tier first.
    pub fn drain(&mut self, max: usize) -> Vec<QueuedEnvelope> {
        let mut out = Vec::with_capacity(max.min(self.len));
        for tier in self.tiers.iter_mut() {
            while out.len() < max {
                match tier.pop_front() {
                    Some(item) => out.push(item),
                    None => break,
                }
            }
            if out.len() == max {
                break;
            }
        }
        self.len -= out.len();
        out
    }

    pub fn depth(&self) -> QueueDepth {
        QueueDepth {
            critical: self.tiers[Priority::Critical.rank()].len(),
            high: self.tiers[Priority::High.rank()].len(),
            normal: self.tiers[Priority::Normal.rank()].len(),
            low: self.tiers[Priority::Low.rank()].len(),
        }
    }

    /// Drop everything; returns how many envelopes were discarded.
    pub fn clear(&mut self) -> usize {
        let n = self.len;
        for tier in self.tiers.iter_mut() {
            tier.clear();
        }
        self.len = 0;
        n
    }

    /// Iterate resident envelopes in drain order.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedEnvelope> {
        self.tiers.iter().flat_map(|t| t.iter())
    }

    fn insert(&mut self, item: QueuedEnvelope, front: bool) -> EnqueueOutcome {
        let priority = item.envelope.priority();
        let mut outcome = EnqueueOutcome::Accepted;

        if self.len >= self.capacity {
            match self.evict_for(priority) {
                Some(victim) => outcome = EnqueueOutcome::Evicted(victim.envelope),
                None => return EnqueueOutcome::Rejected(item.envelope),
            }
        }

        let tier = &mut self.tiers[priority.rank()];
        if front {
            tier.push_front(item);
        } else {
            tier.push_back(item);
        }
        self.len += 1;
        outcome
    }

    /// Oldest envelope of the least important non-empty tier that does not
    /// outrank `incoming`. Critical is never a victim.
    fn evict_for(&mut self, incoming: Priority) -> Option<QueuedEnvelope> {
        for p in Priority::ALL.iter().rev() {
            if *p == Priority::Critical || p.outranks(incoming) {
                return None;
            }
            let tier = &mut self.tiers[p.rank()];
            if let Some(victim) = tier.pop_front() {
                self.len -= 1;
                return Some(victim);
            }
        }
        None
    }
}
