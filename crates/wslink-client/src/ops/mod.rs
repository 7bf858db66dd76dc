//! Operational HTTP endpoints.
//!
//! - `/healthz`     : liveness plus the current connection state
//! - `/diagnostics` : full `DiagnosticReport` as JSON
//! - `/messages`    : inbound message history
//! - `/metrics`     : Prometheus text format
//! - `/ops/knobs`   : partial tuning update (POST, JSON body)
//! - `/ops/*`       : engine actions (POST)

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use wslink_core::{ErrorCode, WsLinkError};

use crate::client::{KnobUpdate, LinkClient};
use crate::obs::metrics::render;

fn error_response(e: WsLinkError) -> Response {
    let status = match e.code() {
        ErrorCode::BadRequest | ErrorCode::InvalidConfig => StatusCode::BAD_REQUEST,
        ErrorCode::Closed => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorCode::Transport => StatusCode::BAD_GATEWAY,
        ErrorCode::InvalidTransition => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = json!({ "code": e.code().as_str(), "message": e.to_string() });
    (status, Json(body)).into_response()
}

fn accepted(r: wslink_core::Result<()>) -> Response {
    match r {
        Ok(()) => (StatusCode::ACCEPTED, "accepted").into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn healthz(State(client): State<LinkClient>) -> impl IntoResponse {
    (StatusCode::OK, client.connection_state().as_str())
}

pub async fn diagnostics(State(client): State<LinkClient>) -> Response {
    match client.diagnostic_report().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn messages(State(client): State<LinkClient>) -> Response {
    match client.message_history().await {
        Ok(history) => Json(history).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn metrics(State(client): State<LinkClient>) -> Response {
    let report = match client.diagnostic_report().await {
        Ok(report) => report,
        Err(e) => return error_response(e),
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        render(&report),
    )
        .into_response()
}

pub async fn force_health_check(State(client): State<LinkClient>) -> Response {
    accepted(client.force_health_check())
}

pub async fn reset_metrics(State(client): State<LinkClient>) -> Response {
    accepted(client.reset_metrics())
}

pub async fn clear_history(State(client): State<LinkClient>) -> Response {
    accepted(client.clear_message_history())
}

pub async fn reconnect(State(client): State<LinkClient>) -> Response {
    accepted(client.reconnect())
}

pub async fn emergency_cleanup(State(client): State<LinkClient>) -> Response {
    match client.emergency_cleanup().await {
        Ok(discarded) => Json(json!({ "discarded": discarded })).into_response(),
        Err(e) => error_response(e),
    }
}

pub async fn update_knobs(
    State(client): State<LinkClient>,
    Json(update): Json<KnobUpdate>,
) -> Response {
    accepted(client.update_knobs(&update))
}
