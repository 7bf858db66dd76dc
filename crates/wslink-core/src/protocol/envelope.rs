//! Envelope and priority model.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, WsLinkError};

/// Ordering class of an envelope. Closed set: any future priority must map
/// into one of these four tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    /// All tiers, most important first (drain order).
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Normal,
        Priority::Low,
    ];

    /// Tier index, 0 = most important.
    pub fn rank(self) -> usize {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Normal => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    /// True when `self` outranks `other`.
    pub fn outranks(self, other: Priority) -> bool {
        self.rank() < other.rank()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = WsLinkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "normal" => Ok(Priority::Normal),
            "low" => Ok(Priority::Low),
            other => Err(WsLinkError::BadRequest(format!("unknown priority: {other}"))),
        }
    }
}

/// Opaque unique envelope token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvelopeId(Uuid);

impl EnvelopeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EnvelopeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EnvelopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One unit of outbound work.
///
/// Everything but `attempts` is fixed at construction; `attempts` is bumped
/// by the transmission path each time the envelope goes out on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    id: EnvelopeId,
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    priority: Priority,
    /// Wall clock, milliseconds since the Unix epoch.
    created_at: u64,
    #[serde(default)]
    attempts: u32,
}

impl Envelope {
    pub fn new(msg_type: impl Into<String>, payload: Value, priority: Priority) -> Self {
        Self {
            id: EnvelopeId::new(),
            msg_type: msg_type.into(),
            payload,
            priority,
            created_at: unix_millis(),
            attempts: 0,
        }
    }

    pub fn id(&self) -> EnvelopeId {
        self.id
    }
    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }
    pub fn payload(&self) -> &Value {
        &self.payload
    }
    pub fn priority(&self) -> Priority {
        self.priority
    }
    pub fn created_at(&self) -> u64 {
        self.created_at
    }
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Count one more transmission attempt; returns the new total.
    pub fn record_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }
}

/// Milliseconds since the Unix epoch (0 if the clock is before it).
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
