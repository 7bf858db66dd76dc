//! wsLink client daemon.
//!
//! Loads `wslink.yaml` (or the path given as the first argument), keeps one
//! WebSocket link to the configured backend, and optionally serves the
//! diagnostics endpoints. Stops on Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use wslink_client::{config, router, transport::WsConnector, LinkClient};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "wslink.yaml".into());
    let cfg = config::load_from_file(&path).expect("config load failed");

    let connector = Arc::new(WsConnector::new(
        cfg.endpoint.url.clone(),
        cfg.endpoint.connect_timeout(),
    ));
    let client = LinkClient::start(&cfg, connector).expect("client start failed");
    client.connect().expect("engine not running");

    if let Some(listen) = cfg.diagnostics.listen.as_deref() {
        let listen: SocketAddr = listen
            .parse()
            .expect("diagnostics.listen must be a valid SocketAddr");
        let app = router::build_router(client.clone());
        let listener = tokio::net::TcpListener::bind(listen)
            .await
            .expect("failed to bind diagnostics listener");
        tracing::info!(%listen, "diagnostics listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "diagnostics server failed");
            }
        });
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    tracing::info!("shutting down");
    client.shutdown().await;
}
