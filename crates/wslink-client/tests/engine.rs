//! End-to-end engine behavior over the in-memory transport.
//!
//! All tests run on a paused clock: timers fire as soon as every task is
//! idle, so heartbeat and backoff scenarios take no wall time.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::time::Duration;

use serde_json::json;
use wslink_client::LinkClient;
use wslink_core::diagnostics::DiagnosticKind;
use wslink_core::health::Quality;
use wslink_core::state::LinkEvent;
use wslink_core::{ConnectionState, ErrorCode, Priority};

use common::{batch_messages, next_peer, test_config, wait_for_state, MockConnector};

#[tokio::test(start_paused = true)]
async fn queued_while_disconnected_is_delivered_on_connect() {
    let (connector, mut peers) = MockConnector::new();
    let client = LinkClient::start(&test_config(), connector.clone()).unwrap();

    let id = client
        .send_message("chat.send", json!({ "text": "hi" }), Priority::High)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let report = client.diagnostic_report().await.unwrap();
    assert_eq!(report.state, ConnectionState::Disconnected);
    assert_eq!(report.queue_depth.high, 1);
    assert_eq!(report.metrics.messages_sent, 0);
    assert_eq!(connector.attempts(), 0);

    client.connect().unwrap();
    let mut peer = next_peer(&mut peers).await;
    let batch = peer.next_batch().await;
    let msgs = batch_messages(&batch);
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0]["id"], id.to_string());
    assert_eq!(msgs[0]["type"], "chat.send");
    assert_eq!(msgs[0]["payload"], json!({ "text": "hi" }));
    assert_eq!(msgs[0]["priority"], "high");
    assert_eq!(msgs[0]["attempts"], 1);

    let report = client.diagnostic_report().await.unwrap();
    assert_eq!(report.queue_depth.total(), 0);
    assert_eq!(report.metrics.messages_sent, 1);
    assert_eq!(report.metrics.batches_sent, 1);
    assert!(client.is_connected());

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn batches_go_out_in_priority_order() {
    let (connector, mut peers) = MockConnector::new();
    let client = LinkClient::start(&test_config(), connector).unwrap();

    client.send_message("n0", json!(null), Priority::Normal).unwrap();
    client.send_message("l0", json!(null), Priority::Low).unwrap();
    client.send_message("n1", json!(null), Priority::Normal).unwrap();
    client.send_message("c0", json!(null), Priority::Critical).unwrap();
    client.send_message("h0", json!(null), Priority::High).unwrap();
    client.send_message("c1", json!(null), Priority::Critical).unwrap();

    client.connect().unwrap();
    let mut peer = next_peer(&mut peers).await;
    let batch = peer.next_batch().await;
    let types: Vec<String> = batch_messages(&batch)
        .iter()
        .map(|m| m["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(types, ["c0", "c1", "h0", "n0", "n1", "l0"]);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn batch_size_caps_each_frame() {
    let (connector, mut peers) = MockConnector::new();
    let client = LinkClient::start(&test_config(), connector).unwrap();
    client.set_batch_size(3).unwrap();

    for i in 0..7 {
        client.send_message(format!("m{i}"), json!(i), Priority::Normal).unwrap();
    }
    client.connect().unwrap();
    let mut peer = next_peer(&mut peers).await;

    let sizes = [
        batch_messages(&peer.next_batch().await).len(),
        batch_messages(&peer.next_batch().await).len(),
        batch_messages(&peer.next_batch().await).len(),
    ];
    assert_eq!(sizes, [3, 3, 1]);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn zero_rate_limit_never_transmits() {
    let (connector, mut peers) = MockConnector::new();
    let mut cfg = test_config();
    cfg.batching.rate_limit_per_sec = 0;
    let client = LinkClient::start(&cfg, connector).unwrap();

    client.connect().unwrap();
    let mut peer = next_peer(&mut peers).await;
    wait_for_state(&client, ConnectionState::Connected).await;

    for i in 0..5 {
        client.send_message("tick", json!(i), Priority::Critical).unwrap();
    }
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(peer.outbound.try_recv().is_err());
    let report = client.diagnostic_report().await.unwrap();
    assert_eq!(report.queue_depth.critical, 5);
    assert_eq!(report.metrics.messages_sent, 0);

    // Raising the limit releases the held messages.
    client.set_rate_limit(100).unwrap();
    let batch = peer.next_batch().await;
    assert_eq!(batch_messages(&batch).len(), 5);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn out_of_range_knobs_are_rejected() {
    let (connector, _peers) = MockConnector::new();
    let client = LinkClient::start(&test_config(), connector).unwrap();

    let err = client.set_batch_size(0).unwrap_err();
    assert_eq!(err.code(), ErrorCode::BadRequest);
    assert!(client.set_rate_limit(1_000_000).is_err());
    assert!(client.set_health_check_interval(5).is_err());
    assert!(client.set_batch_interval(0).is_err());
    assert!(client.send_message("", json!({}), Priority::Low).is_err());

    client.shutdown().await;
    let err = client.connect().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Closed);
}

#[tokio::test(start_paused = true)]
async fn emergency_cleanup_discards_everything() {
    let (connector, mut peers) = MockConnector::new();
    let client = LinkClient::start(&test_config(), connector).unwrap();
    client.set_rate_limit(0).unwrap();

    client.connect().unwrap();
    let mut peer = next_peer(&mut peers).await;
    wait_for_state(&client, ConnectionState::Connected).await;
    for i in 0..10 {
        client.send_message("bulk", json!(i), Priority::Normal).unwrap();
    }

    let discarded = client.emergency_cleanup().await.unwrap();
    assert_eq!(discarded, 10);
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    // The socket was closed from the client side.
    assert!(peer.next_frame().await.is_none());

    let report = client.diagnostic_report().await.unwrap();
    assert_eq!(report.queue_depth.total(), 0);
    assert_eq!(report.in_flight, 0);
    assert_eq!(report.message_history, 0);
    assert!(report
        .events
        .iter()
        .any(|e| e.kind == DiagnosticKind::EmergencyCleanup { discarded: 10 }));

    // Nothing reconnects on its own afterwards.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_keeps_queued_messages() {
    let (connector, mut peers) = MockConnector::new();
    let client = LinkClient::start(&test_config(), connector).unwrap();
    client.set_rate_limit(0).unwrap();

    client.connect().unwrap();
    let _peer = next_peer(&mut peers).await;
    wait_for_state(&client, ConnectionState::Connected).await;
    client.send_message("keep", json!({}), Priority::Low).unwrap();
    client.disconnect().unwrap();
    wait_for_state(&client, ConnectionState::Disconnected).await;

    client.set_rate_limit(100).unwrap();
    client.connect().unwrap();
    let mut peer = next_peer(&mut peers).await;
    let batch = peer.next_batch().await;
    assert_eq!(batch_messages(&batch)[0]["type"], "keep");

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn missed_heartbeats_force_a_reconnect() {
    let (connector, mut peers) = MockConnector::new();
    let mut cfg = test_config();
    cfg.health.interval_ms = 1_000;
    cfg.health.timeout_ms = 500;
    let client = LinkClient::start(&cfg, connector).unwrap();

    client.connect().unwrap();
    let mut peer = next_peer(&mut peers).await;

    // Swallow pings without answering until the client gives up.
    let mut pings = 0;
    while let Some(frame) = peer.next_frame().await {
        if frame["kind"] == "ping" {
            pings += 1;
        }
    }
    assert_eq!(pings, 3);

    let _second = next_peer(&mut peers).await;
    wait_for_state(&client, ConnectionState::Connected).await;

    let report = client.diagnostic_report().await.unwrap();
    assert!(report
        .events
        .iter()
        .any(|e| e.kind == DiagnosticKind::LinkDead { consecutive_timeouts: 3 }));
    assert!(report.events.iter().any(|e| e.kind
        == DiagnosticKind::StateChange {
            from: ConnectionState::Degraded,
            to: ConnectionState::Reconnecting,
            reason: LinkEvent::LinkDead,
        }));
    assert_eq!(report.metrics.reconnect_count, 1);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn pong_replies_grade_quality() {
    let (connector, mut peers) = MockConnector::new();
    let client = LinkClient::start(&test_config(), connector).unwrap();

    client.connect().unwrap();
    let mut peer = next_peer(&mut peers).await;
    wait_for_state(&client, ConnectionState::Connected).await;
    assert_eq!(client.connection_quality(), Quality::Good);

    client.force_health_check().unwrap();
    let ping = peer.next_of_kind("ping").await;
    peer.send(json!({ "kind": "pong", "id": ping["id"] }));

    let mut quality = client.watch_quality();
    tokio::time::timeout(common::WAIT, quality.wait_for(|q| *q == Quality::Excellent))
        .await
        .expect("quality never became excellent")
        .unwrap();
    assert_eq!(client.performance_metrics().last_latency_ms, Some(0));

    let report = client.diagnostic_report().await.unwrap();
    assert_eq!(report.health.last_rtt_ms, Some(0));
    assert_eq!(report.health.pending_probes, 0);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn refused_connections_end_in_failed_until_reconnect() {
    let (connector, mut peers) = MockConnector::new();
    let mut cfg = test_config();
    cfg.reconnect.max_retries = 2;
    let client = LinkClient::start(&cfg, connector.clone()).unwrap();

    connector.set_refuse(true);
    client.connect().unwrap();
    wait_for_state(&client, ConnectionState::Failed).await;
    assert_eq!(connector.attempts(), 3);

    // Failed is terminal until asked.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempts(), 3);

    connector.set_refuse(false);
    client.reconnect().unwrap();
    let _peer = next_peer(&mut peers).await;
    wait_for_state(&client, ConnectionState::Connected).await;
    assert_eq!(connector.attempts(), 4);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn rejected_envelopes_are_resent_and_unacked_survive_link_loss() {
    let (connector, mut peers) = MockConnector::new();
    let mut cfg = test_config();
    cfg.delivery.require_ack = true;
    let client = LinkClient::start(&cfg, connector).unwrap();

    let a = client.send_message("a", json!(1), Priority::Normal).unwrap();
    let b = client.send_message("b", json!(2), Priority::Normal).unwrap();
    client.connect().unwrap();
    let mut peer = next_peer(&mut peers).await;

    let first = peer.next_batch().await;
    assert_eq!(batch_messages(&first).len(), 2);
    peer.send(json!({ "kind": "ack", "batch": first["batch"], "rejected": [b.to_string()] }));

    let second = peer.next_batch().await;
    let msgs = batch_messages(&second);
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0]["id"], b.to_string());
    assert_eq!(msgs[0]["attempts"], 2);
    assert_ne!(msgs[0]["id"], a.to_string());

    // Leave the resend unacked and drop the link from the backend side.
    drop(peer);
    let mut peer = next_peer(&mut peers).await;
    let third = peer.next_batch().await;
    let msgs = batch_messages(&third);
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0]["id"], b.to_string());
    assert_eq!(msgs[0]["attempts"], 3);
    peer.send(json!({ "kind": "ack", "batch": third["batch"] }));

    tokio::time::sleep(Duration::from_millis(200)).await;
    let report = client.diagnostic_report().await.unwrap();
    assert_eq!(report.in_flight, 0);
    assert_eq!(report.queue_depth.total(), 0);
    assert_eq!(report.metrics.delivery_failures, 0);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn attempt_ceiling_drops_the_envelope() {
    let (connector, mut peers) = MockConnector::new();
    let mut cfg = test_config();
    cfg.delivery.require_ack = true;
    cfg.queue.max_attempts = 1;
    let client = LinkClient::start(&cfg, connector).unwrap();

    let id = client.send_message("once", json!({}), Priority::High).unwrap();
    client.connect().unwrap();
    let mut peer = next_peer(&mut peers).await;
    let batch = peer.next_batch().await;
    peer.send(json!({ "kind": "ack", "batch": batch["batch"], "rejected": [id.to_string()] }));

    tokio::time::sleep(Duration::from_millis(500)).await;
    let report = client.diagnostic_report().await.unwrap();
    assert_eq!(report.metrics.delivery_failures, 1);
    assert_eq!(report.queue_depth.total(), 0);
    assert!(report
        .events
        .iter()
        .any(|e| e.kind == DiagnosticKind::DeliveryFailed { id, attempts: 1 }));

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn inbound_messages_fan_out_and_are_kept_in_history() {
    let (connector, mut peers) = MockConnector::new();
    let client = LinkClient::start(&test_config(), connector).unwrap();
    let mut feed = client.subscribe();

    client.connect().unwrap();
    let peer = next_peer(&mut peers).await;
    peer.send(json!({ "kind": "message", "type": "terminal.output", "payload": { "data": "ok" } }));
    peer.send_raw("{ not json");

    let msg = tokio::time::timeout(common::WAIT, feed.recv())
        .await
        .expect("no inbound message")
        .unwrap();
    assert_eq!(msg.msg_type, "terminal.output");
    assert_eq!(msg.payload["data"], "ok");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let history = client.message_history().await.unwrap();
    assert_eq!(history.len(), 1);

    let report = client.diagnostic_report().await.unwrap();
    assert_eq!(report.metrics.decode_errors, 1);
    assert_eq!(report.metrics.messages_received, 2);
    assert_eq!(report.state, ConnectionState::Connected);
    assert_eq!(client.performance_metrics().messages_received, 2);

    client.clear_message_history().unwrap();
    assert!(client.message_history().await.unwrap().is_empty());

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn full_queue_evicts_and_reports() {
    let (connector, _peers) = MockConnector::new();
    let mut cfg = test_config();
    cfg.queue.capacity = 2;
    let client = LinkClient::start(&cfg, connector).unwrap();

    let low = client.send_message("l", json!({}), Priority::Low).unwrap();
    client.send_message("c", json!({}), Priority::Critical).unwrap();
    client.send_message("h", json!({}), Priority::High).unwrap();
    client.send_message("l2", json!({}), Priority::Low).unwrap();

    let report = client.diagnostic_report().await.unwrap();
    assert_eq!(report.queue_depth.total(), 2);
    assert_eq!(report.queue_depth.critical, 1);
    assert_eq!(report.queue_depth.high, 1);
    assert_eq!(report.metrics.evicted, 1);
    assert_eq!(report.metrics.dropped, 1);
    assert!(report.events.iter().any(|e| e.kind
        == DiagnosticKind::Evicted {
            id: low,
            priority: Priority::Low,
        }));

    client.reset_metrics().unwrap();
    let report = client.diagnostic_report().await.unwrap();
    assert_eq!(report.metrics.evicted, 0);
    assert_eq!(report.queue_depth.total(), 2);

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn forced_disconnect_supersedes_unacked_batches() {
    let (connector, mut peers) = MockConnector::new();
    let mut cfg = test_config();
    cfg.delivery.require_ack = true;
    let client = LinkClient::start(&cfg, connector).unwrap();

    let a = client.send_message("a", json!(1), Priority::Normal).unwrap();
    let b = client.send_message("b", json!(2), Priority::High).unwrap();
    client.connect().unwrap();
    let mut old = next_peer(&mut peers).await;
    let first = old.next_batch().await;
    assert_eq!(batch_messages(&first).len(), 2);

    client.disconnect().unwrap();
    wait_for_state(&client, ConnectionState::Disconnected).await;
    assert!(old.next_frame().await.is_none());

    client.connect().unwrap();
    let mut peer = next_peer(&mut peers).await;
    wait_for_state(&client, ConnectionState::Connected).await;
    // An ack for the cut-off batch arriving on the new link settles nothing.
    peer.send(json!({ "kind": "ack", "batch": first["batch"] }));

    tokio::time::sleep(Duration::from_secs(5)).await;
    while let Ok(text) = peer.outbound.try_recv() {
        let frame: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_ne!(frame["kind"], "batch", "superseded envelopes were resent: {frame}");
    }

    let report = client.diagnostic_report().await.unwrap();
    assert_eq!(report.in_flight, 0);
    assert_eq!(report.queue_depth.total(), 0);
    assert_eq!(report.metrics.delivery_failures, 0);
    assert!(report
        .events
        .iter()
        .any(|e| e.kind == DiagnosticKind::Superseded { count: 2 }));

    // New work still flows, without the old envelopes riding along.
    let fresh = client.send_message("fresh", json!(3), Priority::Low).unwrap();
    let batch = peer.next_batch().await;
    let ids: Vec<String> = batch_messages(&batch)
        .iter()
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, [fresh.to_string()]);
    assert!(!ids.contains(&a.to_string()));
    assert!(!ids.contains(&b.to_string()));

    client.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn raising_batch_size_keeps_the_rate_ceiling() {
    let (connector, mut peers) = MockConnector::new();
    let mut cfg = test_config();
    cfg.batching.rate_limit_per_sec = 10;
    let client = LinkClient::start(&cfg, connector).unwrap();
    client.set_batch_size(500).unwrap();

    for i in 0..200 {
        client.send_message("bulk", json!(i), Priority::Normal).unwrap();
    }
    client.connect().unwrap();
    let mut peer = next_peer(&mut peers).await;

    let first = peer.next_batch().await;
    assert_eq!(batch_messages(&first).len(), 10);

    tokio::time::sleep(Duration::from_millis(900)).await;
    let report = client.diagnostic_report().await.unwrap();
    assert!(
        report.metrics.messages_sent <= 20,
        "sent {} within a second at 10/s",
        report.metrics.messages_sent
    );
    assert!(report.queue_depth.total() >= 180);

    client.shutdown().await;
}
