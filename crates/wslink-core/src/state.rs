//! Connection lifecycle state machine.
//!
//! ```text
//! disconnected --connect--> connecting --handshake ok--> connected <--recovered-- degraded
//!                               |  ^                         |  \--poor quality-->  |
//!              handshake failed |  | backoff elapsed         |                      |
//!                               v  |                         |  closed / link dead  |
//!                           reconnecting <-------------------+----------------------+
//!                               |
//!                               | retries exhausted
//!                               v
//!                             failed --reset--> connecting
//! ```
//!
//! Any state moves to `disconnected` on an explicit disconnect. Every
//! transition into a state without a live socket (`connecting`,
//! `reconnecting`, `failed`, `disconnected`) starts a new generation;
//! transport events carry the generation that produced them so the engine can
//! discard anything coming from a socket that no longer exists.

use std::fmt;

use serde::Serialize;

use crate::error::{Result, WsLinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Degraded,
    Reconnecting,
    Failed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Degraded => "degraded",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        }
    }

    /// Transport is up (possibly degraded).
    pub fn is_link_up(self) -> bool {
        matches!(self, ConnectionState::Connected | ConnectionState::Degraded)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkEvent {
    ConnectRequested,
    HandshakeSucceeded,
    HandshakeFailed,
    QualityDegraded,
    QualityRecovered,
    TransportClosed,
    LinkDead,
    BackoffElapsed,
    RetriesExhausted,
    ResetRequested,
    DisconnectRequested,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConnectionState,
    pub to: ConnectionState,
    pub event: LinkEvent,
}

#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    retries: u32,
    max_retries: u32,
    generation: u64,
}

impl ConnectionMachine {
    pub fn new(max_retries: u32) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retries: 0,
            max_retries,
            generation: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Retries spent since the last successful handshake.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// In `reconnecting` with no retries left.
    pub fn retries_exhausted(&self) -> bool {
        self.state == ConnectionState::Reconnecting && self.retries >= self.max_retries
    }

    pub fn apply(&mut self, event: LinkEvent) -> Result<Transition> {
        use ConnectionState as S;
        use LinkEvent as E;

        let from = self.state;
        let to = match (from, event) {
            (_, E::DisconnectRequested) => S::Disconnected,
            (S::Disconnected, E::ConnectRequested) => S::Connecting,
            (S::Failed, E::ConnectRequested | E::ResetRequested) => S::Connecting,
            (S::Connecting, E::HandshakeSucceeded) => S::Connected,
            (S::Connecting, E::HandshakeFailed | E::TransportClosed) => S::Reconnecting,
            (S::Connected, E::QualityDegraded) => S::Degraded,
            (S::Degraded, E::QualityRecovered) => S::Connected,
            (S::Connected | S::Degraded, E::TransportClosed | E::LinkDead) => S::Reconnecting,
            (S::Reconnecting, E::BackoffElapsed) if self.retries < self.max_retries => {
                S::Connecting
            }
            (S::Reconnecting, E::RetriesExhausted) if self.retries >= self.max_retries => {
                S::Failed
            }
            _ => return Err(WsLinkError::InvalidTransition { from, event }),
        };

        match (to, event) {
            (S::Connected, E::HandshakeSucceeded) => self.retries = 0,
            (S::Connecting, E::BackoffElapsed) => self.retries += 1,
            (S::Connecting, _) | (S::Disconnected, _) => self.retries = 0,
            _ => {}
        }
        if !to.is_link_up() {
            self.generation = self.generation.wrapping_add(1);
        }

        self.state = to;
        Ok(Transition { from, to, event })
    }
}
