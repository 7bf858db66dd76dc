//! Client metrics aggregator.
//!
//! Plain counters plus two rolling byte windows. Snapshots are computed on
//! demand; `reset` zeroes counters and windows but leaves connection
//! bookkeeping (`connected_since`) alone, so uptime survives a reset.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::queue::QueueDepth;

/// Span of the rolling rate windows.
pub const RATE_WINDOW: Duration = Duration::from_secs(10);

/// Bytes observed over the last `RATE_WINDOW`.
#[derive(Debug, Default)]
struct RateWindow {
    samples: VecDeque<(Instant, u64)>,
    total: u64,
}

impl RateWindow {
    fn record(&mut self, bytes: u64, now: Instant) {
        self.evict(now);
        self.samples.push_back((now, bytes));
        self.total += bytes;
    }

    fn per_second(&mut self, now: Instant) -> f64 {
        self.evict(now);
        self.total as f64 / RATE_WINDOW.as_secs_f64()
    }

    fn evict(&mut self, now: Instant) {
        while let Some((at, bytes)) = self.samples.front().copied() {
            if now.saturating_duration_since(at) < RATE_WINDOW {
                break;
            }
            self.samples.pop_front();
            self.total -= bytes;
        }
    }

    fn clear(&mut self) {
        self.samples.clear();
        self.total = 0;
    }
}

/// Point-in-time aggregate, rendered by diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub send_rate_bytes_per_sec: f64,
    pub receive_rate_bytes_per_sec: f64,
    pub batches_sent: u64,
    pub queue_depth: QueueDepth,
    pub avg_queue_time_ms: f64,
    pub reconnect_count: u64,
    pub uptime_ms: u64,
    pub last_latency_ms: Option<u64>,
    pub avg_latency_ms: Option<f64>,
    pub evicted: u64,
    pub dropped: u64,
    pub delivery_failures: u64,
    pub decode_errors: u64,
}

/// Read-only projection pushed to observers after every change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PerformanceMetrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub last_latency_ms: Option<u64>,
}

#[derive(Debug, Default)]
pub struct MetricsAggregator {
    messages_sent: u64,
    messages_received: u64,
    bytes_sent: u64,
    bytes_received: u64,
    batches_sent: u64,
    sent_window: RateWindow,
    recv_window: RateWindow,
    queue_time_total: Duration,
    queue_time_samples: u64,
    latency_total: Duration,
    latency_samples: u64,
    last_latency: Option<Duration>,
    reconnect_count: u64,
    evicted: u64,
    dropped: u64,
    delivery_failures: u64,
    decode_errors: u64,
    ever_connected: bool,
    connected_since: Option<Instant>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any outbound frame (batch or ping).
    pub fn record_sent(&mut self, bytes: usize, now: Instant) {
        self.bytes_sent += bytes as u64;
        self.sent_window.record(bytes as u64, now);
    }

    /// Any inbound frame.
    pub fn record_received(&mut self, bytes: usize, now: Instant) {
        self.messages_received += 1;
        self.bytes_received += bytes as u64;
        self.recv_window.record(bytes as u64, now);
    }

    /// A batch left the client; `queue_times` holds one entry per envelope.
    pub fn record_batch(&mut self, queue_times: &[Duration]) {
        self.batches_sent += 1;
        self.messages_sent += queue_times.len() as u64;
        self.queue_time_samples += queue_times.len() as u64;
        self.queue_time_total += queue_times.iter().sum::<Duration>();
    }

    pub fn record_latency(&mut self, rtt: Duration) {
        self.last_latency = Some(rtt);
        self.latency_total += rtt;
        self.latency_samples += 1;
    }

    pub fn record_evicted(&mut self) {
        self.evicted += 1;
    }

    pub fn record_dropped(&mut self) {
        self.dropped += 1;
    }

    pub fn record_delivery_failure(&mut self) {
        self.delivery_failures += 1;
    }

    pub fn record_decode_error(&mut self) {
        self.decode_errors += 1;
    }

    /// Handshake succeeded. Every connection after the first is a reconnect.
    pub fn on_connected(&mut self, now: Instant) {
        if self.ever_connected {
            self.reconnect_count += 1;
        }
        self.ever_connected = true;
        self.connected_since = Some(now);
    }

    pub fn on_disconnected(&mut self) {
        self.connected_since = None;
    }

    pub fn performance(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            messages_sent: self.messages_sent,
            messages_received: self.messages_received,
            last_latency_ms: self.last_latency.map(|d| d.as_millis() as u64),
        }
    }

    pub fn snapshot(&mut self, queue_depth: QueueDepth, now: Instant) -> MetricsSnapshot {
        let avg_queue_time_ms = if self.queue_time_samples == 0 {
            0.0
        } else {
            self.queue_time_total.as_secs_f64() * 1000.0 / self.queue_time_samples as f64
        };
        let avg_latency_ms = (self.latency_samples > 0)
            .then(|| self.latency_total.as_secs_f64() * 1000.0 / self.latency_samples as f64);

        MetricsSnapshot {
            messages_sent: self.messages_sent,
            messages_received: self.messages_received,
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            send_rate_bytes_per_sec: self.sent_window.per_second(now),
            receive_rate_bytes_per_sec: self.recv_window.per_second(now),
            batches_sent: self.batches_sent,
            queue_depth,
            avg_queue_time_ms,
            reconnect_count: self.reconnect_count,
            uptime_ms: self
                .connected_since
                .map(|t| now.saturating_duration_since(t).as_millis() as u64)
                .unwrap_or(0),
            last_latency_ms: self.last_latency.map(|d| d.as_millis() as u64),
            avg_latency_ms,
            evicted: self.evicted,
            dropped: self.dropped,
            delivery_failures: self.delivery_failures,
            decode_errors: self.decode_errors,
        }
    }

    /// Zero every counter. Connection bookkeeping is kept.
    pub fn reset(&mut self) {
        let ever_connected = self.ever_connected;
        let connected_since = self.connected_since;
        *self = Self {
            ever_connected,
            connected_since,
            ..Self::default()
        };
    }
}
