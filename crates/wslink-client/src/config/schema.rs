use std::ops::RangeInclusive;
use std::time::Duration;

use serde::Deserialize;
use wslink_core::backoff::Backoff;
use wslink_core::error::{Result, WsLinkError};
use wslink_core::health::HealthThresholds;

/// Accepted ranges, shared with the runtime tuning knobs.
pub const BATCH_SIZE_RANGE: RangeInclusive<usize> = 1..=1000;
pub const BATCH_INTERVAL_MS_RANGE: RangeInclusive<u64> = 1..=10_000;
pub const RATE_LIMIT_RANGE: RangeInclusive<u32> = 0..=100_000;
pub const HEALTH_INTERVAL_MS_RANGE: RangeInclusive<u64> = 100..=600_000;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub version: u32,

    pub endpoint: EndpointSection,

    #[serde(default)]
    pub batching: BatchingSection,

    #[serde(default)]
    pub queue: QueueSection,

    #[serde(default)]
    pub health: HealthSection,

    #[serde(default)]
    pub reconnect: ReconnectSection,

    #[serde(default)]
    pub delivery: DeliverySection,

    #[serde(default)]
    pub diagnostics: DiagnosticsSection,
}

impl ClientConfig {
    /// All defaults, pointed at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            version: 1,
            endpoint: EndpointSection {
                url: url.into(),
                connect_timeout_ms: default_connect_timeout_ms(),
            },
            batching: BatchingSection::default(),
            queue: QueueSection::default(),
            health: HealthSection::default(),
            reconnect: ReconnectSection::default(),
            delivery: DeliverySection::default(),
            diagnostics: DiagnosticsSection::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(WsLinkError::InvalidConfig(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.endpoint.validate()?;
        self.batching.validate()?;
        self.queue.validate()?;
        self.health.validate()?;
        self.reconnect.validate()?;
        self.delivery.validate()?;
        Ok(())
    }
}

fn invalid(msg: &str) -> WsLinkError {
    WsLinkError::InvalidConfig(msg.into())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointSection {
    pub url: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl EndpointSection {
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("ws://") || self.url.starts_with("wss://")) {
            return Err(invalid("endpoint.url must start with ws:// or wss://"));
        }
        if !(100..=120_000).contains(&self.connect_timeout_ms) {
            return Err(invalid(
                "endpoint.connect_timeout_ms must be between 100 and 120000",
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchingSection {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_batch_interval_ms")]
    pub interval_ms: u64,

    /// Messages per second; 0 pauses sending.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_sec: u32,

    /// Bucket capacity; defaults to `max(rate_limit_per_sec, batch_size)`.
    #[serde(default)]
    pub burst: Option<u32>,
}

impl Default for BatchingSection {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            interval_ms: default_batch_interval_ms(),
            rate_limit_per_sec: default_rate_limit(),
            burst: None,
        }
    }
}

impl BatchingSection {
    pub fn validate(&self) -> Result<()> {
        if !BATCH_SIZE_RANGE.contains(&self.batch_size) {
            return Err(invalid("batching.batch_size must be between 1 and 1000"));
        }
        if !BATCH_INTERVAL_MS_RANGE.contains(&self.interval_ms) {
            return Err(invalid("batching.interval_ms must be between 1 and 10000"));
        }
        if !RATE_LIMIT_RANGE.contains(&self.rate_limit_per_sec) {
            return Err(invalid(
                "batching.rate_limit_per_sec must be between 0 and 100000",
            ));
        }
        if self.burst == Some(0) {
            return Err(invalid("batching.burst must be greater than 0"));
        }
        Ok(())
    }

    pub fn burst_or_default(&self) -> u32 {
        self.burst
            .unwrap_or_else(|| self.rate_limit_per_sec.max(self.batch_size as u32))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_batch_size() -> usize {
    10
}
fn default_batch_interval_ms() -> u64 {
    50
}
fn default_rate_limit() -> u32 {
    100
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueueSection {
    #[serde(default = "default_queue_capacity")]
    pub capacity: usize,

    /// Transmission attempts before an envelope is dropped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            capacity: default_queue_capacity(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl QueueSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1_000_000).contains(&self.capacity) {
            return Err(invalid("queue.capacity must be between 1 and 1000000"));
        }
        if !(1..=100).contains(&self.max_attempts) {
            return Err(invalid("queue.max_attempts must be between 1 and 100"));
        }
        Ok(())
    }
}

fn default_queue_capacity() -> usize {
    1000
}
fn default_max_attempts() -> u32 {
    3
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthSection {
    #[serde(default = "default_health_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_health_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_health_window")]
    pub window: usize,

    #[serde(default = "default_excellent_rtt_ms")]
    pub excellent_rtt_ms: u64,

    #[serde(default = "default_poor_rtt_ms")]
    pub poor_rtt_ms: u64,

    #[serde(default = "default_poor_timeout_ratio")]
    pub poor_timeout_ratio: f64,

    #[serde(default = "default_critical_timeout_ratio")]
    pub critical_timeout_ratio: f64,

    #[serde(default = "default_dead_after_timeouts")]
    pub dead_after_timeouts: u32,

    #[serde(default = "default_critical_grace_ms")]
    pub critical_grace_ms: u64,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            interval_ms: default_health_interval_ms(),
            timeout_ms: default_health_timeout_ms(),
            window: default_health_window(),
            excellent_rtt_ms: default_excellent_rtt_ms(),
            poor_rtt_ms: default_poor_rtt_ms(),
            poor_timeout_ratio: default_poor_timeout_ratio(),
            critical_timeout_ratio: default_critical_timeout_ratio(),
            dead_after_timeouts: default_dead_after_timeouts(),
            critical_grace_ms: default_critical_grace_ms(),
        }
    }
}

impl HealthSection {
    pub fn validate(&self) -> Result<()> {
        if !HEALTH_INTERVAL_MS_RANGE.contains(&self.interval_ms) {
            return Err(invalid("health.interval_ms must be between 100 and 600000"));
        }
        if !(50..=120_000).contains(&self.timeout_ms) {
            return Err(invalid("health.timeout_ms must be between 50 and 120000"));
        }
        if !(1..=1000).contains(&self.window) {
            return Err(invalid("health.window must be between 1 and 1000"));
        }
        if self.excellent_rtt_ms >= self.poor_rtt_ms {
            return Err(invalid(
                "health.excellent_rtt_ms must be lower than health.poor_rtt_ms",
            ));
        }
        let ratios_ok = 0.0 < self.poor_timeout_ratio
            && self.poor_timeout_ratio <= self.critical_timeout_ratio
            && self.critical_timeout_ratio <= 1.0;
        if !ratios_ok {
            return Err(invalid(
                "health ratios must satisfy 0 < poor_timeout_ratio <= critical_timeout_ratio <= 1",
            ));
        }
        if self.dead_after_timeouts == 0 {
            return Err(invalid("health.dead_after_timeouts must be at least 1"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn thresholds(&self) -> HealthThresholds {
        HealthThresholds {
            excellent_rtt: Duration::from_millis(self.excellent_rtt_ms),
            poor_rtt: Duration::from_millis(self.poor_rtt_ms),
            poor_timeout_ratio: self.poor_timeout_ratio,
            critical_timeout_ratio: self.critical_timeout_ratio,
            dead_after_timeouts: self.dead_after_timeouts,
            critical_grace: Duration::from_millis(self.critical_grace_ms),
        }
    }
}

fn default_health_interval_ms() -> u64 {
    30_000
}
fn default_health_timeout_ms() -> u64 {
    5_000
}
fn default_health_window() -> usize {
    20
}
fn default_excellent_rtt_ms() -> u64 {
    100
}
fn default_poor_rtt_ms() -> u64 {
    500
}
fn default_poor_timeout_ratio() -> f64 {
    0.2
}
fn default_critical_timeout_ratio() -> f64 {
    0.5
}
fn default_dead_after_timeouts() -> u32 {
    3
}
fn default_critical_grace_ms() -> u64 {
    15_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectSection {
    #[serde(default = "default_reconnect_base_ms")]
    pub base_ms: u64,

    #[serde(default = "default_reconnect_max_ms")]
    pub max_ms: u64,

    /// Fraction of the current step added as random jitter, 0..=1.
    #[serde(default = "default_reconnect_jitter")]
    pub jitter: f64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            base_ms: default_reconnect_base_ms(),
            max_ms: default_reconnect_max_ms(),
            jitter: default_reconnect_jitter(),
            max_retries: default_max_retries(),
        }
    }
}

impl ReconnectSection {
    pub fn validate(&self) -> Result<()> {
        if !(10..=600_000).contains(&self.base_ms) {
            return Err(invalid("reconnect.base_ms must be between 10 and 600000"));
        }
        if self.max_ms < self.base_ms {
            return Err(invalid("reconnect.max_ms must not be lower than base_ms"));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(invalid("reconnect.jitter must be between 0 and 1"));
        }
        Ok(())
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.base_ms),
            Duration::from_millis(self.max_ms),
            self.jitter,
        )
    }
}

fn default_reconnect_base_ms() -> u64 {
    1_000
}
fn default_reconnect_max_ms() -> u64 {
    30_000
}
fn default_reconnect_jitter() -> f64 {
    0.3
}
fn default_max_retries() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeliverySection {
    /// Hold written batches until the backend acks them.
    #[serde(default)]
    pub require_ack: bool,

    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
}

impl Default for DeliverySection {
    fn default() -> Self {
        Self {
            require_ack: false,
            ack_timeout_ms: default_ack_timeout_ms(),
        }
    }
}

impl DeliverySection {
    pub fn validate(&self) -> Result<()> {
        if !(10..=600_000).contains(&self.ack_timeout_ms) {
            return Err(invalid("delivery.ack_timeout_ms must be between 10 and 600000"));
        }
        Ok(())
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }
}

fn default_ack_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsSection {
    /// Bind address of the diagnostics HTTP surface; disabled when absent.
    #[serde(default)]
    pub listen: Option<String>,

    #[serde(default = "default_event_history")]
    pub event_history: usize,

    #[serde(default = "default_message_history")]
    pub message_history: usize,
}

impl Default for DiagnosticsSection {
    fn default() -> Self {
        Self {
            listen: None,
            event_history: default_event_history(),
            message_history: default_message_history(),
        }
    }
}

fn default_event_history() -> usize {
    256
}
fn default_message_history() -> usize {
    500
}
