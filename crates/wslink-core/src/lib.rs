//! wslink core: runtime-free building blocks of the realtime client.
//!
//! This crate defines the envelope/priority model, the wire frames, and every
//! piece of client state that does not need a runtime: the priority queue set,
//! the rate limiter, the batching scheduler, the health monitor, the backoff
//! policy, the connection state machine and the metrics aggregator. Everything
//! that depends on time takes an explicit `now: Instant`, so the runtime crate
//! drives it and tests can replay exact timelines.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `WsLinkError`/`Result` so a bad frame or a
//! misconfigured knob can never bring down the host process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod backoff;
pub mod diagnostics;
pub mod error;
pub mod health;
pub mod limiter;
pub mod metrics;
pub mod protocol;
pub mod queue;
pub mod scheduler;
pub mod state;

/// Shared result type.
pub use error::{ErrorCode, Result, WsLinkError};
pub use protocol::envelope::{Envelope, EnvelopeId, Priority};
pub use state::ConnectionState;
