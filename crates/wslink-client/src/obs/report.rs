use serde::Serialize;

use wslink_core::diagnostics::DiagnosticEvent;
use wslink_core::health::Quality;
use wslink_core::metrics::MetricsSnapshot;
use wslink_core::queue::QueueDepth;
use wslink_core::ConnectionState;

/// Point-in-time view of one client, as served by `GET /diagnostics`.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub state: ConnectionState,
    pub quality: Quality,
    pub metrics: MetricsSnapshot,
    pub queue_depth: QueueDepth,
    pub queue_capacity: usize,
    /// Envelopes written but not yet acknowledged.
    pub in_flight: usize,
    pub tokens_available: f64,
    pub knobs: Knobs,
    pub health: HealthReport,
    pub connection: ConnectionReport,
    pub message_history: usize,
    pub events: Vec<DiagnosticEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Knobs {
    pub batch_size: usize,
    pub batch_interval_ms: u64,
    pub rate_limit_per_sec: u32,
    pub health_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub avg_rtt_ms: Option<f64>,
    pub last_rtt_ms: Option<u64>,
    pub timeout_ratio: f64,
    pub consecutive_timeouts: u32,
    pub pending_probes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub generation: u64,
    pub retries: u32,
    pub max_retries: u32,
}
