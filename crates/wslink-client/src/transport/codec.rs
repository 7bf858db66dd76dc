//! Classify raw WebSocket messages before they reach the engine.
//!
//! - Text frames are handed over as-is (JSON decoding happens once, in the engine)
//! - Binary frames are not part of the protocol and are reported by size
//! - Ping/Pong are answered by tungstenite itself; Close ends the stream

use tokio_tungstenite::tungstenite::Message;

#[derive(Debug)]
pub enum Inbound {
    Text(String),
    Binary(usize),
    Control,
    Close,
}

pub fn classify(msg: Message) -> Inbound {
    match msg {
        Message::Text(s) => Inbound::Text(s),
        Message::Binary(b) => Inbound::Binary(b.len()),
        Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Inbound::Control,
        Message::Close(_) => Inbound::Close,
    }
}
