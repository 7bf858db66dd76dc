//! Axum router wiring for the diagnostics listener.
//!
//! Read-only views live under the root; actions that touch the engine are
//! POST-only under `/ops`.

use axum::{
    routing::{get, post},
    Router,
};

use crate::{client::LinkClient, ops};

pub fn build_router(client: LinkClient) -> Router {
    Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/diagnostics", get(ops::diagnostics))
        .route("/messages", get(ops::messages))
        .route("/metrics", get(ops::metrics))
        .route("/ops/health-check", post(ops::force_health_check))
        .route("/ops/reset-metrics", post(ops::reset_metrics))
        .route("/ops/clear-history", post(ops::clear_history))
        .route("/ops/emergency-cleanup", post(ops::emergency_cleanup))
        .route("/ops/reconnect", post(ops::reconnect))
        .route("/ops/knobs", post(ops::update_knobs))
        .with_state(client)
}
