use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use wslink_core::backoff::Backoff;
use wslink_core::diagnostics::{DiagnosticKind, DiagnosticLog};
use wslink_core::health::{HealthMonitor, Quality, Verdict};
use wslink_core::limiter::RateLimiter;
use wslink_core::metrics::{MetricsAggregator, PerformanceMetrics};
use wslink_core::protocol::envelope::unix_millis;
use wslink_core::protocol::frame::{
    decode_server_frame, encode_client_frame, ClientFrame, ServerFrame,
};
use wslink_core::queue::{EnqueueOutcome, PriorityQueueSet, QueuedEnvelope};
use wslink_core::scheduler::BatchScheduler;
use wslink_core::state::{ConnectionMachine, LinkEvent, Transition};
use wslink_core::{ConnectionState, Envelope, EnvelopeId, WsLinkError};

use crate::config::ClientConfig;
use crate::obs::{ConnectionReport, DiagnosticReport, HealthReport, Knobs};
use crate::transport::{Connector, FrameSink, FrameStream, LinkParts};

use super::command::Command;
use super::inbound::{InboundMessage, MessageHistory};
use super::inflight::InFlight;

/// Upper bound on a graceful close of a socket being torn down.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Read-only projections published after every engine step.
pub struct Observers {
    pub state: watch::Sender<ConnectionState>,
    pub quality: watch::Sender<Quality>,
    pub performance: watch::Sender<PerformanceMetrics>,
    pub inbound: broadcast::Sender<InboundMessage>,
}

/// Transport event, tagged with the generation of the socket that produced it.
struct LinkMsg {
    generation: u64,
    signal: LinkSignal,
}

enum LinkSignal {
    Established(LinkParts),
    ConnectFailed(WsLinkError),
    Frame(String),
    FrameError(WsLinkError),
    Closed,
}

/// What happens to in-flight batches when a socket goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    /// Link lost: unacknowledged work goes back to the front of the queue.
    Requeue,
    /// Forced disconnect: unacknowledged work is dropped, never retried.
    Discard,
}

#[derive(Debug, Default, Clone, Copy)]
struct Timers {
    batch: Option<Instant>,
    probe: Option<Instant>,
    probe_timeout: Option<Instant>,
    retry: Option<Instant>,
    ack: Option<Instant>,
}

pub struct Engine {
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    link_tx: mpsc::UnboundedSender<LinkMsg>,
    link_rx: mpsc::UnboundedReceiver<LinkMsg>,
    observers: Observers,

    queue: PriorityQueueSet,
    limiter: RateLimiter,
    scheduler: BatchScheduler,
    health: HealthMonitor,
    machine: ConnectionMachine,
    backoff: Backoff,
    inflight: InFlight,
    metrics: MetricsAggregator,
    diagnostics: DiagnosticLog,
    history: MessageHistory,

    max_attempts: u32,
    require_ack: bool,
    ack_timeout: Duration,
    health_interval: Duration,
    quality: Quality,

    sink: Option<Box<dyn FrameSink>>,
    reader: Option<JoinHandle<()>>,
    connect_task: Option<JoinHandle<()>>,
    timers: Timers,
    next_batch_id: u64,
}

impl Engine {
    pub fn new(
        cfg: &ClientConfig,
        connector: Arc<dyn Connector>,
        commands: mpsc::UnboundedReceiver<Command>,
        observers: Observers,
    ) -> Self {
        let now = Instant::now().into_std();
        let (link_tx, link_rx) = mpsc::unbounded_channel();

        Self {
            connector,
            commands,
            link_tx,
            link_rx,
            observers,
            queue: PriorityQueueSet::new(cfg.queue.capacity),
            limiter: RateLimiter::new(
                cfg.batching.rate_limit_per_sec,
                cfg.batching.burst_or_default(),
                now,
            ),
            scheduler: BatchScheduler::new(cfg.batching.batch_size, cfg.batching.interval()),
            health: HealthMonitor::new(
                cfg.health.thresholds(),
                cfg.health.timeout(),
                cfg.health.window,
            ),
            machine: ConnectionMachine::new(cfg.reconnect.max_retries),
            backoff: cfg.reconnect.backoff(),
            inflight: InFlight::default(),
            metrics: MetricsAggregator::new(),
            diagnostics: DiagnosticLog::new(cfg.diagnostics.event_history),
            history: MessageHistory::new(cfg.diagnostics.message_history),
            max_attempts: cfg.queue.max_attempts,
            require_ack: cfg.delivery.require_ack,
            ack_timeout: cfg.delivery.ack_timeout(),
            health_interval: cfg.health.interval(),
            quality: Quality::Good,
            sink: None,
            reader: None,
            connect_task: None,
            timers: Timers::default(),
            next_batch_id: 1,
        }
    }

    pub async fn run(mut self) {
        self.timers.batch = Some(Instant::now() + self.scheduler.interval());
        self.publish();

        loop {
            self.refresh_deadlines();
            let t = self.timers;

            tokio::select! {
                biased;

                cmd = self.commands.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.on_command(cmd).await,
                },
                Some(msg) = self.link_rx.recv() => self.on_link(msg).await,
                _ = until(t.probe_timeout) => self.on_probe_timeout().await,
                _ = until(t.retry) => self.on_backoff_elapsed(),
                _ = until(t.ack) => self.on_ack_timeout(),
                _ = until(t.probe) => self.on_probe_due().await,
                _ = until(t.batch) => self.on_batch_tick().await,
            }

            self.publish();
        }

        self.force_disconnect().await;
        self.publish();
        tracing::info!("engine stopped");
    }

    // --------------------
    // Commands
    // --------------------
    async fn on_command(&mut self, cmd: Command) {
        let now = Instant::now();
        match cmd {
            Command::Send(envelope) => self.enqueue(envelope, now),
            Command::Connect => self.connect(),
            Command::Disconnect => self.force_disconnect().await,
            Command::Reconnect => self.reconnect().await,
            Command::SetBatchSize(n) => {
                self.scheduler.set_batch_size(n);
                tracing::info!(batch_size = n, "batch size changed");
            }
            Command::SetBatchInterval(interval) => {
                self.scheduler.set_interval(interval);
                self.timers.batch = Some(now + self.scheduler.interval());
                tracing::info!(interval_ms = interval.as_millis() as u64, "batch interval changed");
            }
            Command::SetRateLimit(rate) => self.limiter.set_limit(rate, now.into_std()),
            Command::SetHealthInterval(interval) => {
                self.health_interval = interval;
                if self.timers.probe.is_some() {
                    self.timers.probe = Some(now + interval);
                }
                tracing::info!(interval_ms = interval.as_millis() as u64, "health check interval changed");
            }
            Command::ForceHealthCheck => self.send_probe(now).await,
            Command::ResetMetrics => {
                self.metrics.reset();
                tracing::info!("metrics reset");
            }
            Command::ClearHistory => self.history.clear(),
            Command::EmergencyCleanup(reply) => {
                let discarded = self.emergency_cleanup().await;
                self.publish();
                let _ = reply.send(discarded);
            }
            Command::Report(reply) => {
                let _ = reply.send(self.report());
            }
            Command::History(reply) => {
                let _ = reply.send(self.history.snapshot());
            }
            Command::Shutdown => {}
        }
    }

    fn enqueue(&mut self, envelope: Envelope, now: Instant) {
        let outcome = self.queue.enqueue(envelope, now.into_std());
        self.note_outcome(outcome);
    }

    fn note_outcome(&mut self, outcome: EnqueueOutcome) {
        match outcome {
            EnqueueOutcome::Accepted => {}
            EnqueueOutcome::Evicted(victim) => {
                tracing::warn!(
                    id = %victim.id(),
                    priority = %victim.priority(),
                    "queue full; evicted oldest lower-priority envelope"
                );
                self.metrics.record_evicted();
                self.diagnostics.record(DiagnosticKind::Evicted {
                    id: victim.id(),
                    priority: victim.priority(),
                });
            }
            EnqueueOutcome::Rejected(envelope) => {
                tracing::warn!(
                    id = %envelope.id(),
                    priority = %envelope.priority(),
                    "queue full; envelope dropped"
                );
                self.metrics.record_dropped();
                self.diagnostics.record(DiagnosticKind::Rejected {
                    id: envelope.id(),
                    priority: envelope.priority(),
                });
            }
        }
    }

    fn connect(&mut self) {
        match self.machine.state() {
            ConnectionState::Disconnected | ConnectionState::Failed => {
                if self.transition(LinkEvent::ConnectRequested).is_some() {
                    self.start_connect();
                }
            }
            state => tracing::debug!(%state, "connect ignored"),
        }
    }

    async fn reconnect(&mut self) {
        match self.machine.state() {
            ConnectionState::Failed => {
                if self.transition(LinkEvent::ResetRequested).is_some() {
                    self.start_connect();
                }
            }
            ConnectionState::Disconnected => self.connect(),
            _ => {
                self.force_disconnect().await;
                self.connect();
            }
        }
    }

    /// Tear everything down and land in `disconnected`. In-flight work is
    /// discarded; queued work stays queued.
    async fn force_disconnect(&mut self) {
        self.timers.retry = None;
        self.teardown_link(Teardown::Discard).await;
        self.transition(LinkEvent::DisconnectRequested);
    }

    async fn emergency_cleanup(&mut self) -> usize {
        let in_flight = self.inflight.envelope_count();
        self.force_disconnect().await;
        let queued = self.queue.clear();
        self.limiter.reset(Instant::now().into_std());
        self.history.clear();

        let discarded = queued + in_flight;
        tracing::warn!(discarded, "emergency cleanup: all pending work discarded");
        self.diagnostics
            .record(DiagnosticKind::EmergencyCleanup { discarded });
        discarded
    }

    // --------------------
    // Connection lifecycle
    // --------------------
    fn transition(&mut self, event: LinkEvent) -> Option<Transition> {
        match self.machine.apply(event) {
            Ok(t) => {
                if t.from != t.to {
                    tracing::info!(
                        from = %t.from,
                        to = %t.to,
                        ?event,
                        generation = self.machine.generation(),
                        "connection state changed"
                    );
                    self.diagnostics.record(DiagnosticKind::StateChange {
                        from: t.from,
                        to: t.to,
                        reason: event,
                    });
                }
                Some(t)
            }
            Err(e) => {
                tracing::debug!(error = %e, "transition ignored");
                None
            }
        }
    }

    fn start_connect(&mut self) {
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        let generation = self.machine.generation();
        let connector = Arc::clone(&self.connector);
        let tx = self.link_tx.clone();

        self.connect_task = Some(tokio::spawn(async move {
            let signal = match connector.connect().await {
                Ok(parts) => LinkSignal::Established(parts),
                Err(e) => LinkSignal::ConnectFailed(e),
            };
            let _ = tx.send(LinkMsg { generation, signal });
        }));
    }

    fn schedule_retry(&mut self) {
        if self.machine.retries_exhausted() {
            self.timers.retry = None;
            tracing::error!(
                retries = self.machine.retries(),
                "reconnect attempts exhausted; explicit reconnect required"
            );
            self.transition(LinkEvent::RetriesExhausted);
            return;
        }

        let delay = self.backoff.delay(self.machine.retries());
        self.timers.retry = Some(Instant::now() + delay);
        tracing::info!(
            attempt = self.machine.retries() + 1,
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );
    }

    fn on_backoff_elapsed(&mut self) {
        self.timers.retry = None;
        if self.transition(LinkEvent::BackoffElapsed).is_some() {
            self.start_connect();
        }
    }

    async fn on_link(&mut self, msg: LinkMsg) {
        if !self.machine.is_current(msg.generation) {
            tracing::debug!(
                generation = msg.generation,
                current = self.machine.generation(),
                "dropping event from stale connection"
            );
            if let LinkSignal::Established(mut parts) = msg.signal {
                let _ = tokio::time::timeout(CLOSE_GRACE, parts.sink.close()).await;
            }
            return;
        }

        match msg.signal {
            LinkSignal::Established(parts) => self.on_established(parts, msg.generation).await,
            LinkSignal::ConnectFailed(e) => {
                self.connect_task = None;
                tracing::warn!(error = %e, "connect attempt failed");
                if self.transition(LinkEvent::HandshakeFailed).is_some() {
                    self.schedule_retry();
                }
            }
            LinkSignal::Frame(text) => self.on_frame(text).await,
            LinkSignal::FrameError(e) => self.on_decode_error(e),
            LinkSignal::Closed => {
                tracing::warn!("transport closed by peer");
                self.on_link_lost(LinkEvent::TransportClosed).await;
            }
        }
    }

    async fn on_established(&mut self, mut parts: LinkParts, generation: u64) {
        self.connect_task = None;
        if self.transition(LinkEvent::HandshakeSucceeded).is_none() {
            let _ = tokio::time::timeout(CLOSE_GRACE, parts.sink.close()).await;
            return;
        }

        let now = Instant::now();
        self.sink = Some(parts.sink);
        self.reader = Some(spawn_reader(parts.stream, generation, self.link_tx.clone()));
        self.health.reset();
        self.quality = self.health.quality();
        self.timers.probe = Some(now + self.health_interval);
        self.timers.retry = None;
        self.metrics.on_connected(now.into_std());
        tracing::info!(generation, queued = self.queue.len(), "link established");
    }

    /// Transport closed or declared dead: requeue unacknowledged work and
    /// start the backoff cycle.
    async fn on_link_lost(&mut self, event: LinkEvent) {
        if self.transition(event).is_none() {
            return;
        }
        self.teardown_link(Teardown::Requeue).await;
        self.schedule_retry();
    }

    async fn teardown_link(&mut self, mode: Teardown) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        if let Some(mut sink) = self.sink.take() {
            let _ = tokio::time::timeout(CLOSE_GRACE, sink.close()).await;
        }
        self.health.cancel_pending();
        self.timers.probe = None;
        self.metrics.on_disconnected();

        let flights = self.inflight.take_all();
        if flights.is_empty() {
            return;
        }
        let items: Vec<QueuedEnvelope> = flights.into_iter().flat_map(|b| b.items).collect();
        match mode {
            Teardown::Requeue => {
                tracing::info!(count = items.len(), "requeueing unacknowledged envelopes");
                self.retry_or_fail(items);
            }
            Teardown::Discard => {
                let count = items.len();
                tracing::warn!(count, "in-flight envelopes superseded by disconnect");
                self.diagnostics.record(DiagnosticKind::Superseded { count });
            }
        }
    }

    // --------------------
    // Outbound
    // --------------------
    async fn on_batch_tick(&mut self) {
        let now = Instant::now();
        self.timers.batch = Some(now + self.scheduler.interval());

        let batch = self.scheduler.next_batch(
            &mut self.queue,
            &mut self.limiter,
            self.machine.state(),
            now.into_std(),
        );
        if let Some(batch) = batch {
            self.transmit(batch, now).await;
        }
    }

    async fn transmit(&mut self, mut batch: Vec<QueuedEnvelope>, now: Instant) {
        if self.sink.is_none() {
            self.note_requeued(batch);
            return;
        }
        for item in batch.iter_mut() {
            item.envelope.record_attempt();
        }

        let batch_id = self.next_batch_id;
        self.next_batch_id += 1;

        let messages: Vec<&Envelope> = batch.iter().map(|q| &q.envelope).collect();
        let frame = match encode_client_frame(&ClientFrame::Batch {
            batch: batch_id,
            messages,
        }) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(batch = batch_id, error = %e, "batch encoding failed; dropping");
                for item in &batch {
                    self.fail_delivery(&item.envelope);
                }
                return;
            }
        };
        let bytes = frame.len();

        let sent = match self.sink.as_mut() {
            Some(sink) => sink.send_text(frame).await,
            None => Err(WsLinkError::Closed),
        };

        match sent {
            Ok(()) => {
                let now_std = now.into_std();
                let queue_times: Vec<Duration> = batch
                    .iter()
                    .map(|q| now_std.saturating_duration_since(q.enqueued_at))
                    .collect();
                self.metrics.record_sent(bytes, now_std);
                self.metrics.record_batch(&queue_times);
                tracing::debug!(batch = batch_id, size = batch.len(), bytes, "batch sent");

                if self.require_ack {
                    self.inflight
                        .insert(batch_id, self.machine.generation(), batch, now);
                }
            }
            Err(e) => {
                tracing::warn!(batch = batch_id, error = %e, "batch send failed; requeueing");
                self.retry_or_fail(batch);
            }
        }
    }

    /// Put items back at the front of their tiers unless they used up their
    /// attempts.
    fn retry_or_fail(&mut self, items: Vec<QueuedEnvelope>) {
        let max_attempts = self.max_attempts;
        let (retry, failed): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|q| q.envelope.attempts() < max_attempts);

        for item in &failed {
            self.fail_delivery(&item.envelope);
        }
        self.note_requeued(retry);
    }

    fn note_requeued(&mut self, items: Vec<QueuedEnvelope>) {
        for outcome in self.queue.requeue_front(items) {
            self.note_outcome(outcome);
        }
    }

    fn fail_delivery(&mut self, envelope: &Envelope) {
        tracing::warn!(
            id = %envelope.id(),
            attempts = envelope.attempts(),
            "delivery failed; envelope dropped"
        );
        self.metrics.record_delivery_failure();
        self.diagnostics.record(DiagnosticKind::DeliveryFailed {
            id: envelope.id(),
            attempts: envelope.attempts(),
        });
    }

    fn on_ack(&mut self, batch: u64, rejected: Vec<EnvelopeId>) {
        let Some(flight) = self.inflight.ack(batch, self.machine.generation()) else {
            tracing::debug!(batch, "ack for unknown batch");
            return;
        };
        if rejected.is_empty() {
            return;
        }
        let retry: Vec<QueuedEnvelope> = flight
            .items
            .into_iter()
            .filter(|q| rejected.contains(&q.envelope.id()))
            .collect();
        tracing::info!(batch, rejected = retry.len(), "backend rejected envelopes");
        self.retry_or_fail(retry);
    }

    fn on_ack_timeout(&mut self) {
        let expired = self.inflight.expire(Instant::now(), self.ack_timeout);
        if expired.is_empty() {
            return;
        }
        let items: Vec<QueuedEnvelope> = expired.into_iter().flat_map(|b| b.items).collect();
        tracing::warn!(count = items.len(), "ack timed out; requeueing");
        self.retry_or_fail(items);
    }

    // --------------------
    // Health
    // --------------------
    async fn on_probe_due(&mut self) {
        let now = Instant::now();
        self.timers.probe = Some(now + self.health_interval);
        self.send_probe(now).await;
    }

    async fn send_probe(&mut self, now: Instant) {
        if !self.machine.state().is_link_up() {
            tracing::debug!(state = %self.machine.state(), "health check skipped; link down");
            return;
        }
        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        let id = self.health.begin_probe(now.into_std());
        let frame = match encode_client_frame(&ClientFrame::Ping {
            id,
            sent_at: unix_millis(),
        }) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "ping encoding failed");
                return;
            }
        };
        let bytes = frame.len();
        match sink.send_text(frame).await {
            Ok(()) => self.metrics.record_sent(bytes, now.into_std()),
            // The probe stays pending and will time out.
            Err(e) => tracing::debug!(probe = id, error = %e, "ping send failed"),
        }
    }

    async fn on_probe_timeout(&mut self) {
        let now = Instant::now();
        let expired = self.health.expire(now.into_std());
        if expired > 0 {
            tracing::warn!(
                expired,
                consecutive = self.health.consecutive_timeouts(),
                "heartbeat timed out"
            );
            self.evaluate_health(now).await;
        }
    }

    async fn evaluate_health(&mut self, now: Instant) {
        let quality = self.health.quality();
        if quality != self.quality {
            self.quality = quality;
            tracing::info!(quality = quality.as_str(), "connection quality changed");
            self.diagnostics
                .record(DiagnosticKind::QualityChange { quality });
        }

        let state = self.machine.state();
        match self.health.verdict(now.into_std()) {
            Verdict::Dead if state.is_link_up() => {
                let consecutive_timeouts = self.health.consecutive_timeouts();
                tracing::warn!(consecutive_timeouts, "link declared dead");
                self.diagnostics.record(DiagnosticKind::LinkDead {
                    consecutive_timeouts,
                });
                self.on_link_lost(LinkEvent::LinkDead).await;
            }
            Verdict::Degraded | Verdict::Dead if state == ConnectionState::Connected => {
                self.transition(LinkEvent::QualityDegraded);
            }
            Verdict::Healthy if state == ConnectionState::Degraded => {
                self.transition(LinkEvent::QualityRecovered);
            }
            _ => {}
        }
    }

    // --------------------
    // Inbound
    // --------------------
    async fn on_frame(&mut self, text: String) {
        let now = Instant::now();
        self.metrics.record_received(text.len(), now.into_std());

        let frame = match decode_server_frame(&text) {
            Ok(frame) => frame,
            Err(e) => return self.on_decode_error(e),
        };

        match frame {
            ServerFrame::Pong { id } => match self.health.on_pong(id, now.into_std()) {
                Some(rtt) => {
                    self.metrics.record_latency(rtt);
                    tracing::debug!(probe = id, rtt_ms = rtt.as_millis() as u64, "pong");
                    self.evaluate_health(now).await;
                }
                None => tracing::debug!(probe = id, "unmatched pong"),
            },
            ServerFrame::Ack { batch, rejected } => self.on_ack(batch, rejected),
            ServerFrame::Message { msg_type, payload } => {
                let msg = InboundMessage {
                    msg_type,
                    payload,
                    received_at: unix_millis(),
                };
                self.history.push(msg.clone());
                // No subscribers is fine.
                let _ = self.observers.inbound.send(msg);
            }
        }
    }

    fn on_decode_error(&mut self, e: WsLinkError) {
        tracing::warn!(error = %e, "undecodable frame");
        self.metrics.record_decode_error();
        self.diagnostics.record(DiagnosticKind::DecodeError {
            error: e.to_string(),
        });
    }

    // --------------------
    // Observers / reports
    // --------------------
    fn refresh_deadlines(&mut self) {
        self.timers.probe_timeout = self.health.next_deadline().map(Instant::from_std);
        self.timers.ack = if self.require_ack {
            self.inflight.next_deadline(self.ack_timeout)
        } else {
            None
        };
    }

    fn publish(&mut self) {
        let state = self.machine.state();
        let quality = self.quality;
        let performance = self.metrics.performance();

        self.observers.state.send_if_modified(|s| replace_if_changed(s, state));
        self.observers
            .quality
            .send_if_modified(|q| replace_if_changed(q, quality));
        self.observers
            .performance
            .send_if_modified(|p| replace_if_changed(p, performance));
    }

    fn report(&mut self) -> DiagnosticReport {
        let now = Instant::now().into_std();
        let queue_depth = self.queue.depth();

        DiagnosticReport {
            state: self.machine.state(),
            quality: self.quality,
            metrics: self.metrics.snapshot(queue_depth, now),
            queue_depth,
            queue_capacity: self.queue.capacity(),
            in_flight: self.inflight.envelope_count(),
            tokens_available: self.limiter.available(now),
            knobs: Knobs {
                batch_size: self.scheduler.batch_size(),
                batch_interval_ms: self.scheduler.interval().as_millis() as u64,
                rate_limit_per_sec: self.limiter.rate(),
                health_interval_ms: self.health_interval.as_millis() as u64,
            },
            health: HealthReport {
                avg_rtt_ms: self
                    .health
                    .average_rtt()
                    .map(|d| d.as_secs_f64() * 1000.0),
                last_rtt_ms: self.health.last_rtt().map(|d| d.as_millis() as u64),
                timeout_ratio: self.health.timeout_ratio(),
                consecutive_timeouts: self.health.consecutive_timeouts(),
                pending_probes: self.health.pending(),
            },
            connection: ConnectionReport {
                generation: self.machine.generation(),
                retries: self.machine.retries(),
                max_retries: self.machine.max_retries(),
            },
            message_history: self.history.len(),
            events: self.diagnostics.recent(),
        }
    }
}

fn replace_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

/// Sleep until `deadline`; never resolves when there is none.
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

fn spawn_reader(
    mut stream: Box<dyn FrameStream>,
    generation: u64,
    tx: mpsc::UnboundedSender<LinkMsg>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = stream.next_text().await {
            let signal = match item {
                Ok(text) => LinkSignal::Frame(text),
                Err(e) => LinkSignal::FrameError(e),
            };
            if tx.send(LinkMsg { generation, signal }).is_err() {
                return;
            }
        }
        let _ = tx.send(LinkMsg {
            generation,
            signal: LinkSignal::Closed,
        });
    })
}
