//! Protocol modules (envelope model + wire frames).
//!
//! - `envelope`: the unit of outbound work and its priority class.
//! - `frame`: the JSON text frames exchanged with the backend.
//!
//! Decoding is panic-free: malformed input is reported as `WsLinkError`
//! and counted by the caller instead of tearing the session down.

pub mod envelope;
pub mod frame;
