//! Batches written to the socket but not yet acknowledged.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;
use wslink_core::queue::QueuedEnvelope;

#[derive(Debug)]
pub struct InFlightBatch {
    pub generation: u64,
    pub sent_at: Instant,
    pub items: Vec<QueuedEnvelope>,
}

/// Keyed by batch id; ids only grow, so map order is send order.
#[derive(Debug, Default)]
pub struct InFlight {
    batches: BTreeMap<u64, InFlightBatch>,
}

impl InFlight {
    pub fn insert(&mut self, batch: u64, generation: u64, items: Vec<QueuedEnvelope>, now: Instant) {
        self.batches.insert(
            batch,
            InFlightBatch {
                generation,
                sent_at: now,
                items,
            },
        );
    }

    /// Settle a batch. Acks for unknown batches or from another generation
    /// are ignored.
    pub fn ack(&mut self, batch: u64, generation: u64) -> Option<InFlightBatch> {
        match self.batches.get(&batch) {
            Some(b) if b.generation == generation => self.batches.remove(&batch),
            _ => None,
        }
    }

    /// Remove batches whose ack is overdue, oldest first.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Vec<InFlightBatch> {
        let overdue: Vec<u64> = self
            .batches
            .iter()
            .filter(|(_, b)| now.saturating_duration_since(b.sent_at) >= timeout)
            .map(|(id, _)| *id)
            .collect();
        overdue
            .into_iter()
            .filter_map(|id| self.batches.remove(&id))
            .collect()
    }

    /// Everything, oldest batch first.
    pub fn take_all(&mut self) -> Vec<InFlightBatch> {
        std::mem::take(&mut self.batches).into_values().collect()
    }

    pub fn next_deadline(&self, timeout: Duration) -> Option<Instant> {
        self.batches.values().map(|b| b.sent_at + timeout).min()
    }

    /// Envelopes held across all batches.
    pub fn envelope_count(&self) -> usize {
        self.batches.values().map(|b| b.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
