//! `LinkClient`: the cloneable handle producers and diagnostic panels use.
//!
//! Every mutating call is a `Command` to the engine task. Reads of state,
//! quality and performance counters come from `watch` channels the engine
//! publishes to, so they never wait on the engine.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;

use wslink_core::health::Quality;
use wslink_core::metrics::PerformanceMetrics;
use wslink_core::{ConnectionState, Envelope, EnvelopeId, Priority, Result, WsLinkError};

use crate::config::schema::{
    BATCH_INTERVAL_MS_RANGE, BATCH_SIZE_RANGE, HEALTH_INTERVAL_MS_RANGE, RATE_LIMIT_RANGE,
};
use crate::config::ClientConfig;
use crate::engine::{Command, Engine, InboundMessage, Observers};
use crate::obs::DiagnosticReport;
use crate::transport::Connector;

/// Inbound fan-out buffer; slow subscribers see `Lagged` past this.
const INBOUND_BUFFER: usize = 256;

/// Partial knob change; absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KnobUpdate {
    pub batch_size: Option<usize>,
    pub batch_interval_ms: Option<u64>,
    pub rate_limit_per_sec: Option<u32>,
    pub health_interval_ms: Option<u64>,
}

#[derive(Clone)]
pub struct LinkClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    quality: watch::Receiver<Quality>,
    performance: watch::Receiver<PerformanceMetrics>,
    inbound: broadcast::Sender<InboundMessage>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl LinkClient {
    /// Validate `cfg` and spawn the engine. The client starts disconnected;
    /// call [`LinkClient::connect`] to open the link. Must be called from
    /// inside a tokio runtime.
    pub fn start(cfg: &ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        cfg.validate()?;

        let (commands, rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let (quality_tx, quality) = watch::channel(Quality::Good);
        let (perf_tx, performance) = watch::channel(PerformanceMetrics::default());
        let (inbound, _) = broadcast::channel(INBOUND_BUFFER);

        let observers = Observers {
            state: state_tx,
            quality: quality_tx,
            performance: perf_tx,
            inbound: inbound.clone(),
        };
        let engine = Engine::new(cfg, connector, rx, observers);
        let task = tokio::spawn(engine.run());

        tracing::info!(url = %cfg.endpoint.url, "link client started");
        Ok(Self {
            inner: Arc::new(ClientInner {
                commands,
                state,
                quality,
                performance,
                inbound,
                task: Mutex::new(Some(task)),
            }),
        })
    }

    fn command(&self, cmd: Command) -> Result<()> {
        self.inner
            .commands
            .send(cmd)
            .map_err(|_| WsLinkError::Closed)
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.command(make(tx))?;
        rx.await.map_err(|_| WsLinkError::Closed)
    }

    /// Queue a message for delivery. Never waits on the network; the returned
    /// id identifies the envelope in diagnostics.
    pub fn send_message(
        &self,
        msg_type: impl Into<String>,
        payload: Value,
        priority: Priority,
    ) -> Result<EnvelopeId> {
        let msg_type = msg_type.into();
        if msg_type.is_empty() {
            return Err(WsLinkError::BadRequest("message type must not be empty".into()));
        }
        let envelope = Envelope::new(msg_type, payload, priority);
        let id = envelope.id();
        self.command(Command::Send(envelope))?;
        Ok(id)
    }

    pub fn connect(&self) -> Result<()> {
        self.command(Command::Connect)
    }

    /// Close the link and stay disconnected. Queued messages are kept.
    pub fn disconnect(&self) -> Result<()> {
        self.command(Command::Disconnect)
    }

    /// Leave `failed`, or drop the current link and dial again.
    pub fn reconnect(&self) -> Result<()> {
        self.command(Command::Reconnect)
    }

    pub fn set_batch_size(&self, n: usize) -> Result<()> {
        check_batch_size(n)?;
        self.command(Command::SetBatchSize(n))
    }

    pub fn set_batch_interval(&self, ms: u64) -> Result<()> {
        check_batch_interval(ms)?;
        self.command(Command::SetBatchInterval(Duration::from_millis(ms)))
    }

    /// Messages per second; 0 pauses transmission.
    pub fn set_rate_limit(&self, per_sec: u32) -> Result<()> {
        check_rate_limit(per_sec)?;
        self.command(Command::SetRateLimit(per_sec))
    }

    pub fn set_health_check_interval(&self, ms: u64) -> Result<()> {
        check_health_interval(ms)?;
        self.command(Command::SetHealthInterval(Duration::from_millis(ms)))
    }

    /// Apply several knobs at once. Nothing changes unless every given value
    /// is in range.
    pub fn update_knobs(&self, update: &KnobUpdate) -> Result<()> {
        if let Some(n) = update.batch_size {
            check_batch_size(n)?;
        }
        if let Some(ms) = update.batch_interval_ms {
            check_batch_interval(ms)?;
        }
        if let Some(per_sec) = update.rate_limit_per_sec {
            check_rate_limit(per_sec)?;
        }
        if let Some(ms) = update.health_interval_ms {
            check_health_interval(ms)?;
        }

        if let Some(n) = update.batch_size {
            self.command(Command::SetBatchSize(n))?;
        }
        if let Some(ms) = update.batch_interval_ms {
            self.command(Command::SetBatchInterval(Duration::from_millis(ms)))?;
        }
        if let Some(per_sec) = update.rate_limit_per_sec {
            self.command(Command::SetRateLimit(per_sec))?;
        }
        if let Some(ms) = update.health_interval_ms {
            self.command(Command::SetHealthInterval(Duration::from_millis(ms)))?;
        }
        Ok(())
    }

    /// Send a probe now. A no-op while the link is down.
    pub fn force_health_check(&self) -> Result<()> {
        self.command(Command::ForceHealthCheck)
    }

    pub fn reset_metrics(&self) -> Result<()> {
        self.command(Command::ResetMetrics)
    }

    pub fn clear_message_history(&self) -> Result<()> {
        self.command(Command::ClearHistory)
    }

    /// Disconnect and discard all queued and in-flight messages. Returns the
    /// number discarded.
    pub async fn emergency_cleanup(&self) -> Result<usize> {
        self.request(Command::EmergencyCleanup).await
    }

    pub async fn diagnostic_report(&self) -> Result<DiagnosticReport> {
        self.request(Command::Report).await
    }

    /// Inbound application messages, oldest first.
    pub async fn message_history(&self) -> Result<Vec<InboundMessage>> {
        self.request(Command::History).await
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state().is_link_up()
    }

    pub fn connection_quality(&self) -> Quality {
        *self.inner.quality.borrow()
    }

    pub fn performance_metrics(&self) -> PerformanceMetrics {
        *self.inner.performance.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.clone()
    }

    pub fn watch_quality(&self) -> watch::Receiver<Quality> {
        self.inner.quality.clone()
    }

    /// Live feed of inbound application messages.
    pub fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        self.inner.inbound.subscribe()
    }

    /// Stop the engine and wait for it. Idempotent.
    pub async fn shutdown(&self) {
        let _ = self.inner.commands.send(Command::Shutdown);
        let task = self.inner.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "engine task ended abnormally");
            }
        }
    }
}

fn check_batch_size(n: usize) -> Result<()> {
    if !BATCH_SIZE_RANGE.contains(&n) {
        return Err(WsLinkError::BadRequest(format!(
            "batch size {n} outside {BATCH_SIZE_RANGE:?}"
        )));
    }
    Ok(())
}

fn check_batch_interval(ms: u64) -> Result<()> {
    if !BATCH_INTERVAL_MS_RANGE.contains(&ms) {
        return Err(WsLinkError::BadRequest(format!(
            "batch interval {ms}ms outside {BATCH_INTERVAL_MS_RANGE:?}"
        )));
    }
    Ok(())
}

fn check_rate_limit(per_sec: u32) -> Result<()> {
    if !RATE_LIMIT_RANGE.contains(&per_sec) {
        return Err(WsLinkError::BadRequest(format!(
            "rate limit {per_sec}/s outside {RATE_LIMIT_RANGE:?}"
        )));
    }
    Ok(())
}

fn check_health_interval(ms: u64) -> Result<()> {
    if !HEALTH_INTERVAL_MS_RANGE.contains(&ms) {
        return Err(WsLinkError::BadRequest(format!(
            "health check interval {ms}ms outside {HEALTH_INTERVAL_MS_RANGE:?}"
        )));
    }
    Ok(())
}
