//! Top-level facade crate for wslink.
//!
//! Re-exports the core primitives and the client runtime so users can depend on a single crate.

pub mod core {
    pub use wslink_core::*;
}

pub mod client {
    pub use wslink_client::*;
}
