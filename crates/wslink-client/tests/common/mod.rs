//! In-memory transport for engine tests.
//!
//! Every successful `connect` hands the test a `MockPeer`: the backend end of
//! the link. Dropping the peer closes the link from the backend side.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use wslink_client::config::ClientConfig;
use wslink_client::transport::{Connector, FrameSink, FrameStream, LinkParts};
use wslink_client::LinkClient;
use wslink_core::{ConnectionState, Result, WsLinkError};

/// Generous upper bound; with paused time this is virtual.
pub const WAIT: Duration = Duration::from_secs(300);

pub struct MockConnector {
    refuse: AtomicBool,
    attempts: AtomicU32,
    peers: mpsc::UnboundedSender<MockPeer>,
}

impl MockConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            refuse: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
            peers,
        });
        (connector, rx)
    }

    pub fn set_refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self) -> Result<LinkParts> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(WsLinkError::Transport("connection refused".into()));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        self.peers
            .send(MockPeer {
                outbound: out_rx,
                inbound: in_tx,
            })
            .map_err(|_| WsLinkError::Transport("test dropped the peer receiver".into()))?;

        Ok(LinkParts {
            sink: Box::new(MockSink { tx: Some(out_tx) }),
            stream: Box::new(MockStream { rx: in_rx }),
        })
    }
}

struct MockSink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl FrameSink for MockSink {
    async fn send_text(&mut self, frame: String) -> Result<()> {
        match &self.tx {
            Some(tx) => tx
                .send(frame)
                .map_err(|_| WsLinkError::Transport("peer gone".into())),
            None => Err(WsLinkError::Closed),
        }
    }

    async fn close(&mut self) {
        self.tx = None;
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameStream for MockStream {
    async fn next_text(&mut self) -> Option<Result<String>> {
        self.rx.recv().await.map(Ok)
    }
}

/// Backend side of one mock connection.
pub struct MockPeer {
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub inbound: mpsc::UnboundedSender<String>,
}

impl MockPeer {
    /// Next frame from the client; `None` once the client closed the link.
    pub async fn next_frame(&mut self) -> Option<Value> {
        let text = tokio::time::timeout(WAIT, self.outbound.recv())
            .await
            .expect("timed out waiting for a client frame")?;
        Some(serde_json::from_str(&text).expect("client frames are json"))
    }

    pub async fn next_of_kind(&mut self, kind: &str) -> Value {
        loop {
            let frame = self.next_frame().await.expect("link closed");
            if frame["kind"] == kind {
                return frame;
            }
        }
    }

    pub async fn next_batch(&mut self) -> Value {
        self.next_of_kind("batch").await
    }

    pub fn send(&self, frame: Value) {
        self.inbound.send(frame.to_string()).expect("client gone");
    }

    pub fn send_raw(&self, text: &str) {
        self.inbound.send(text.to_string()).expect("client gone");
    }
}

pub async fn next_peer(peers: &mut mpsc::UnboundedReceiver<MockPeer>) -> MockPeer {
    tokio::time::timeout(WAIT, peers.recv())
        .await
        .expect("timed out waiting for a connection")
        .expect("connector dropped")
}

pub async fn wait_for_state(client: &LinkClient, state: ConnectionState) {
    let mut rx = client.watch_state();
    tokio::time::timeout(WAIT, rx.wait_for(|s| *s == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {state}"))
        .expect("engine stopped");
}

/// Defaults, fast batching, slow heartbeats.
pub fn test_config() -> ClientConfig {
    let mut cfg = ClientConfig::new("ws://backend.test/v1/link");
    cfg.batching.interval_ms = 50;
    cfg.health.interval_ms = 60_000;
    cfg.reconnect.base_ms = 100;
    cfg.reconnect.max_ms = 1_000;
    cfg
}

pub fn batch_messages(batch: &Value) -> Vec<Value> {
    batch["messages"].as_array().cloned().unwrap_or_default()
}
