//! Wire frames (JSON text, `kind`-tagged).
//!
//! Client -> backend:
//! - `{"kind":"batch","batch":7,"messages":[...]}`
//! - `{"kind":"ping","id":3,"sent_at":1700000000000}`
//!
//! Backend -> client:
//! - `{"kind":"pong","id":3}` (correlation id echoes the ping)
//! - `{"kind":"ack","batch":7,"rejected":["<envelope id>"]}`
//! - `{"kind":"message","type":"terminal.output","payload":{...}}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::envelope::{Envelope, EnvelopeId};
use crate::error::{Result, WsLinkError};

/// Outbound frame. Borrows the batch so in-flight envelopes are not cloned.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClientFrame<'a> {
    Batch {
        batch: u64,
        messages: Vec<&'a Envelope>,
    },
    Ping {
        id: u64,
        sent_at: u64,
    },
}

/// Inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerFrame {
    Pong {
        id: u64,
    },
    Ack {
        batch: u64,
        #[serde(default)]
        rejected: Vec<EnvelopeId>,
    },
    Message {
        #[serde(rename = "type")]
        msg_type: String,
        #[serde(default)]
        payload: Value,
    },
}

pub fn encode_client_frame(frame: &ClientFrame<'_>) -> Result<String> {
    serde_json::to_string(frame)
        .map_err(|e| WsLinkError::Internal(format!("encode frame failed: {e}")))
}

pub fn decode_server_frame(text: &str) -> Result<ServerFrame> {
    serde_json::from_str(text)
        .map_err(|e| WsLinkError::BadRequest(format!("invalid server frame: {e}")))
}
