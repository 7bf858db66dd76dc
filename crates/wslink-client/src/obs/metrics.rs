//! Prometheus text rendering of a `DiagnosticReport`.
//!
//! The engine owns its counters, so there is no registry here: each scrape
//! asks the engine for a report and flattens it. Labels are written in a
//! fixed order to keep the output deterministic.

use std::fmt::Write;

use wslink_core::{ConnectionState, Priority};

use super::report::DiagnosticReport;

const STATES: [ConnectionState; 6] = [
    ConnectionState::Disconnected,
    ConnectionState::Connecting,
    ConnectionState::Connected,
    ConnectionState::Degraded,
    ConnectionState::Reconnecting,
    ConnectionState::Failed,
];

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn header(out: &mut String, name: &str, kind: &str) {
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

fn sample(out: &mut String, name: &str, labels: &[(&str, &str)], value: f64) {
    if labels.is_empty() {
        let _ = writeln!(out, "{} {}", name, value);
        return;
    }
    let label_str = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",");
    let _ = writeln!(out, "{}{{{}}} {}", name, label_str, value);
}

fn counter(out: &mut String, name: &str, value: u64) {
    header(out, name, "counter");
    sample(out, name, &[], value as f64);
}

fn gauge(out: &mut String, name: &str, value: f64) {
    header(out, name, "gauge");
    sample(out, name, &[], value);
}

/// Render a report in Prometheus text exposition format.
pub fn render(report: &DiagnosticReport) -> String {
    let mut out = String::new();
    let m = &report.metrics;

    counter(&mut out, "wslink_messages_sent_total", m.messages_sent);
    counter(&mut out, "wslink_messages_received_total", m.messages_received);
    counter(&mut out, "wslink_bytes_sent_total", m.bytes_sent);
    counter(&mut out, "wslink_bytes_received_total", m.bytes_received);
    counter(&mut out, "wslink_batches_sent_total", m.batches_sent);
    counter(&mut out, "wslink_reconnects_total", m.reconnect_count);
    counter(&mut out, "wslink_envelopes_evicted_total", m.evicted);
    counter(&mut out, "wslink_envelopes_dropped_total", m.dropped);
    counter(&mut out, "wslink_delivery_failures_total", m.delivery_failures);
    counter(&mut out, "wslink_decode_errors_total", m.decode_errors);

    gauge(&mut out, "wslink_send_rate_bytes", m.send_rate_bytes_per_sec);
    gauge(&mut out, "wslink_receive_rate_bytes", m.receive_rate_bytes_per_sec);
    gauge(&mut out, "wslink_queue_time_avg_ms", m.avg_queue_time_ms);
    gauge(&mut out, "wslink_uptime_ms", m.uptime_ms as f64);
    gauge(&mut out, "wslink_in_flight_envelopes", report.in_flight as f64);
    gauge(&mut out, "wslink_rate_limit_tokens", report.tokens_available);
    if let Some(ms) = m.last_latency_ms {
        gauge(&mut out, "wslink_latency_last_ms", ms as f64);
    }

    header(&mut out, "wslink_queue_depth", "gauge");
    for p in Priority::ALL {
        sample(
            &mut out,
            "wslink_queue_depth",
            &[("priority", p.as_str())],
            report.queue_depth.get(p) as f64,
        );
    }

    header(&mut out, "wslink_connection_state", "gauge");
    for s in STATES {
        let v = if s == report.state { 1.0 } else { 0.0 };
        sample(&mut out, "wslink_connection_state", &[("state", s.as_str())], v);
    }

    header(&mut out, "wslink_connection_quality", "gauge");
    sample(
        &mut out,
        "wslink_connection_quality",
        &[("quality", report.quality.as_str())],
        1.0,
    );

    out
}
