//! Session engine: the single task that owns all mutable client state.
//!
//! Producers reach it through `Command`s; the connect attempt and the socket
//! reader report back through generation-tagged `LinkMsg`s. Timers are plain
//! deadlines owned by the engine and awaited in one `select!`, so clearing a
//! deadline is all it takes to cancel one.

pub mod command;
pub mod inbound;
pub mod inflight;
pub mod session;

pub use command::Command;
pub use inbound::{InboundMessage, MessageHistory};
pub use session::{Engine, Observers};
