//! Shared error type across wslink crates.

use thiserror::Error;

use crate::state::{ConnectionState, LinkEvent};

/// Stable error codes (diagnostics and HTTP responses).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Invalid input / malformed frame.
    BadRequest,
    /// Configuration out of range or unparsable.
    InvalidConfig,
    /// Socket level failure.
    Transport,
    /// Timed out waiting for the peer.
    Timeout,
    /// State machine refused an event.
    InvalidTransition,
    /// Client engine is gone.
    Closed,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in reports and JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::InvalidTransition => "INVALID_TRANSITION",
            ErrorCode::Closed => "CLOSED",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, WsLinkError>;

/// Unified error type used by core and client.
#[derive(Debug, Error)]
pub enum WsLinkError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("transport: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("invalid transition: {event:?} in state {from}")]
    InvalidTransition {
        from: ConnectionState,
        event: LinkEvent,
    },
    #[error("client closed")]
    Closed,
    #[error("internal: {0}")]
    Internal(String),
}

impl WsLinkError {
    /// Map an error to its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            WsLinkError::BadRequest(_) => ErrorCode::BadRequest,
            WsLinkError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            WsLinkError::Transport(_) => ErrorCode::Transport,
            WsLinkError::Timeout => ErrorCode::Timeout,
            WsLinkError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            WsLinkError::Closed => ErrorCode::Closed,
            WsLinkError::Internal(_) => ErrorCode::Internal,
        }
    }
}
