use std::time::Duration;

use tokio::sync::oneshot;
use wslink_core::Envelope;

use crate::obs::DiagnosticReport;

use super::inbound::InboundMessage;

/// Requests from `LinkClient` handles to the engine, processed in order.
#[derive(Debug)]
pub enum Command {
    Send(Envelope),
    Connect,
    Disconnect,
    /// Explicit reset: leaves `failed`, or restarts a live connection.
    Reconnect,
    SetBatchSize(usize),
    SetBatchInterval(Duration),
    SetRateLimit(u32),
    SetHealthInterval(Duration),
    ForceHealthCheck,
    ResetMetrics,
    ClearHistory,
    /// Replies with the number of discarded envelopes.
    EmergencyCleanup(oneshot::Sender<usize>),
    Report(oneshot::Sender<DiagnosticReport>),
    History(oneshot::Sender<Vec<InboundMessage>>),
    Shutdown,
}
