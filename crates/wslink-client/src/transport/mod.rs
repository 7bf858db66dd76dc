//! Transport layer (WebSocket client).
//!
//! The engine only sees the `Connector` / `FrameSink` / `FrameStream` seam:
//! a connect attempt yields a sink the engine writes text frames to and a
//! stream a reader task drains. `ws` implements it over tokio-tungstenite;
//! tests plug in an in-memory connector.

pub mod codec;
pub mod ws;

use async_trait::async_trait;

use wslink_core::error::Result;

pub use ws::WsConnector;

/// Opens one socket per call.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<LinkParts>;
}

/// Write half of one connection.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_text(&mut self, frame: String) -> Result<()>;
    /// Best effort; errors are swallowed.
    async fn close(&mut self);
}

/// Read half of one connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Next text frame. `None` once the peer closed or the socket broke.
    async fn next_text(&mut self) -> Option<Result<String>>;
}

pub struct LinkParts {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}
