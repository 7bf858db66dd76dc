//! Diagnostics surface: the report handed to diagnostic panels and its
//! Prometheus text rendering.

pub mod metrics;
pub mod report;

pub use report::{ConnectionReport, DiagnosticReport, HealthReport, Knobs};
