//! wsLink client library entry.
//!
//! Wires the sans-IO building blocks from `wslink-core` (queues, limiter,
//! scheduler, health monitor, connection state machine, metrics) into one
//! tokio engine task behind a cloneable [`LinkClient`] handle. The binary
//! (`main.rs`) and integration tests consume it from here.

pub mod client;
pub mod config;
pub mod engine;
pub mod obs;
pub mod ops;
pub mod router;
pub mod transport;

pub use client::{KnobUpdate, LinkClient};
