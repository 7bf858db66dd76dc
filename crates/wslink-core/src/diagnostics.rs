//! Bounded log of notable client events (evictions, drops, transitions).

use std::collections::VecDeque;

use serde::Serialize;

use crate::health::Quality;
use crate::protocol::envelope::{unix_millis, EnvelopeId, Priority};
use crate::state::{ConnectionState, LinkEvent};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Older envelope pushed out to make room.
    Evicted { id: EnvelopeId, priority: Priority },
    /// Incoming envelope dropped on a full queue.
    Rejected { id: EnvelopeId, priority: Priority },
    /// Attempt ceiling reached.
    DeliveryFailed { id: EnvelopeId, attempts: u32 },
    /// In-flight envelopes discarded by a forced disconnect.
    Superseded { count: usize },
    DecodeError { error: String },
    StateChange {
        from: ConnectionState,
        to: ConnectionState,
        reason: LinkEvent,
    },
    QualityChange { quality: Quality },
    LinkDead { consecutive_timeouts: u32 },
    EmergencyCleanup { discarded: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticEvent {
    /// Wall clock, milliseconds since the Unix epoch.
    pub at_ms: u64,
    #[serde(flatten)]
    pub kind: DiagnosticKind,
}

#[derive(Debug)]
pub struct DiagnosticLog {
    events: VecDeque<DiagnosticEvent>,
    capacity: usize,
}

impl DiagnosticLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn record(&mut self, kind: DiagnosticKind) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(DiagnosticEvent {
            at_ms: unix_millis(),
            kind,
        });
    }

    /// Oldest first.
    pub fn recent(&self) -> Vec<DiagnosticEvent> {
        self.events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
