//! tokio-tungstenite implementation of the transport seam.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use wslink_core::error::{Result, WsLinkError};

use super::codec::{classify, Inbound};
use super::{Connector, FrameSink, FrameStream, LinkParts};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<LinkParts> {
        let (socket, response) =
            tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()))
                .await
                .map_err(|_| WsLinkError::Timeout)?
                .map_err(|e| WsLinkError::Transport(format!("websocket connect failed: {e}")))?;

        tracing::info!(
            url = %self.url,
            status = response.status().as_u16(),
            "websocket handshake complete"
        );

        let (sink, stream) = socket.split();
        Ok(LinkParts {
            sink: Box::new(WsSink { inner: sink }),
            stream: Box::new(WsStream { inner: stream }),
        })
    }
}

struct WsSink {
    inner: SplitSink<Socket, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, frame: String) -> Result<()> {
        self.inner
            .send(Message::Text(frame))
            .await
            .map_err(|e| WsLinkError::Transport(format!("websocket send failed: {e}")))
    }

    async fn close(&mut self) {
        let _ = self.inner.close().await;
    }
}

struct WsStream {
    inner: SplitStream<Socket>,
}

#[async_trait]
impl FrameStream for WsStream {
    async fn next_text(&mut self) -> Option<Result<String>> {
        loop {
            let msg = match self.inner.next().await? {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!(error = %e, "websocket read failed");
                    return None;
                }
            };
            match classify(msg) {
                Inbound::Text(s) => return Some(Ok(s)),
                Inbound::Binary(len) => {
                    return Some(Err(WsLinkError::BadRequest(format!(
                        "unexpected binary frame ({len} bytes)"
                    ))))
                }
                Inbound::Control => continue,
                Inbound::Close => return None,
            }
        }
    }
}
