//! Heartbeat bookkeeping and connection quality grading.
//!
//! The monitor does no I/O. The engine calls `begin_probe` when it sends a
//! ping, `on_pong` when a reply arrives and `expire` when a probe deadline
//! passes. Replies are matched by correlation id, so reordered or late pongs
//! for probes that already timed out are ignored.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Minimum window size before the timeout fraction can grade `critical`.
const RATIO_MIN_SAMPLES: usize = 5;

/// Coarse health grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Excellent,
    Good,
    Poor,
    Critical,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Excellent => "excellent",
            Quality::Good => "good",
            Quality::Poor => "poor",
            Quality::Critical => "critical",
        }
    }

    pub fn is_degraded(self) -> bool {
        matches!(self, Quality::Poor | Quality::Critical)
    }
}

/// What the state machine should make of the current health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Healthy,
    Degraded,
    /// Treat the link as dead even if the transport still looks open.
    Dead,
}

#[derive(Debug, Clone)]
pub struct HealthThresholds {
    pub excellent_rtt: Duration,
    pub poor_rtt: Duration,
    pub poor_timeout_ratio: f64,
    pub critical_timeout_ratio: f64,
    pub dead_after_timeouts: u32,
    pub critical_grace: Duration,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            excellent_rtt: Duration::from_millis(100),
            poor_rtt: Duration::from_millis(500),
            poor_timeout_ratio: 0.2,
            critical_timeout_ratio: 0.5,
            dead_after_timeouts: 3,
            critical_grace: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HealthSample {
    pub sent_at: Instant,
    /// `None` = timed out.
    pub rtt: Option<Duration>,
}

#[derive(Debug)]
pub struct HealthMonitor {
    thresholds: HealthThresholds,
    timeout: Duration,
    window: VecDeque<HealthSample>,
    window_size: usize,
    pending: HashMap<u64, Instant>,
    next_id: u64,
    consecutive_timeouts: u32,
    critical_since: Option<Instant>,
    last_rtt: Option<Duration>,
}

impl HealthMonitor {
    pub fn new(thresholds: HealthThresholds, timeout: Duration, window_size: usize) -> Self {
        Self {
            thresholds,
            timeout,
            window: VecDeque::with_capacity(window_size.max(1)),
            window_size: window_size.max(1),
            pending: HashMap::new(),
            next_id: 1,
            consecutive_timeouts: 0,
            critical_since: None,
            last_rtt: None,
        }
    }

    /// Register an outgoing probe; returns its correlation id.
    pub fn begin_probe(&mut self, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.pending.insert(id, now);
        id
    }

    /// Match a reply. Unknown ids (stale, duplicate, already expired) yield `None`.
    pub fn on_pong(&mut self, id: u64, now: Instant) -> Option<Duration> {
        let sent_at = self.pending.remove(&id)?;
        let rtt = now.saturating_duration_since(sent_at);
        self.consecutive_timeouts = 0;
        self.last_rtt = Some(rtt);
        self.push(HealthSample {
            sent_at,
            rtt: Some(rtt),
        });
        self.track_critical(now);
        Some(rtt)
    }

    /// Turn overdue probes into timeout samples; returns how many expired.
    pub fn expire(&mut self, now: Instant) -> usize {
        let timeout = self.timeout;
        let mut overdue: Vec<(u64, Instant)> = self
            .pending
            .iter()
            .filter(|(_, sent)| now.saturating_duration_since(**sent) >= timeout)
            .map(|(id, sent)| (*id, *sent))
            .collect();
        overdue.sort_by_key(|(_, sent)| *sent);

        for (id, sent_at) in &overdue {
            self.pending.remove(id);
            self.consecutive_timeouts = self.consecutive_timeouts.saturating_add(1);
            self.push(HealthSample {
                sent_at: *sent_at,
                rtt: None,
            });
        }
        if !overdue.is_empty() {
            self.track_critical(now);
        }
        overdue.len()
    }

    /// Earliest instant at which a pending probe times out.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().map(|sent| *sent + self.timeout)
    }

    /// Forget outstanding probes without recording them.
    pub fn cancel_pending(&mut self) {
        self.pending.clear();
    }

    /// Fresh connection: drop every sample and counter.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.window.clear();
        self.consecutive_timeouts = 0;
        self.critical_since = None;
        self.last_rtt = None;
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn samples(&self) -> impl Iterator<Item = &HealthSample> {
        self.window.iter()
    }

    pub fn consecutive_timeouts(&self) -> u32 {
        self.consecutive_timeouts
    }

    pub fn last_rtt(&self) -> Option<Duration> {
        self.last_rtt
    }

    /// Mean RTT over answered probes in the window.
    pub fn average_rtt(&self) -> Option<Duration> {
        let answered: Vec<Duration> = self.window.iter().filter_map(|s| s.rtt).collect();
        if answered.is_empty() {
            return None;
        }
        Some(answered.iter().sum::<Duration>() / answered.len() as u32)
    }

    pub fn timeout_ratio(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let timeouts = self.window.iter().filter(|s| s.rtt.is_none()).count();
        timeouts as f64 / self.window.len() as f64
    }

    pub fn quality(&self) -> Quality {
        let t = &self.thresholds;
        if self.window.is_empty() {
            return Quality::Good;
        }
        if self.consecutive_timeouts >= t.dead_after_timeouts {
            return Quality::Critical;
        }
        let ratio = self.timeout_ratio();
        if self.window.len() >= RATIO_MIN_SAMPLES && ratio >= t.critical_timeout_ratio {
            return Quality::Critical;
        }

        let avg = self.average_rtt();
        if ratio >= t.poor_timeout_ratio || avg.map_or(false, |a| a >= t.poor_rtt) {
            return Quality::Poor;
        }
        match avg {
            Some(a) if a < t.excellent_rtt && ratio == 0.0 => Quality::Excellent,
            _ => Quality::Good,
        }
    }

    pub fn verdict(&self, now: Instant) -> Verdict {
        if self.consecutive_timeouts >= self.thresholds.dead_after_timeouts {
            return Verdict::Dead;
        }
        if let Some(since) = self.critical_since {
            if now.saturating_duration_since(since) >= self.thresholds.critical_grace {
                return Verdict::Dead;
            }
        }
        if self.quality().is_degraded() {
            Verdict::Degraded
        } else {
            Verdict::Healthy
        }
    }

    fn push(&mut self, sample: HealthSample) {
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(sample);
    }

    fn track_critical(&mut self, now: Instant) {
        if self.quality() == Quality::Critical {
            self.critical_since.get_or_insert(now);
        } else {
            self.critical_since = None;
        }
    }
}
