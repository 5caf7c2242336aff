// server.rs
//
// The scrape surface: `GET /metrics` renders the current Prometheus
// exposition text, recomputed fresh from the scheduler's probes on every
// request; `GET /` is a minimal human-readable index.

use std::net::SocketAddr;

use axum::{extract::State, routing::get, Router};
use prometheus::{Encoder, TextEncoder};
use tokio::net::TcpListener;
use tracing::info;

use crate::metrics::AppState;

async fn metrics_handler(State(state): State<AppState>) -> String {
    for m in state.view.snapshot().await {
        state.gauges.observe(&m);
    }

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&state.registry.gather(), &mut buffer)
        .expect("prometheus text encoding is infallible for gauge families");
    String::from_utf8(buffer).expect("prometheus text encoder always emits valid utf-8")
}

async fn index_handler() -> axum::response::Html<&'static str> {
    axum::response::Html(
        "<html><head><title>video-stream-exporter</title></head>\
<body><h1>video-stream-exporter</h1>\
<p><a href=\"/metrics\">Metrics</a></p></body></html>",
    )
}

/// Binds and serves until the returned future is dropped or errors.
/// `listen_addr` is the normalized `:PORT` or `HOST:PORT` form produced by
/// `Config::load`.
pub async fn run_server(
    state: AppState,
    listen_addr: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state);

    let addr = resolve_listen_addr(listen_addr)?;
    info!(%addr, "metrics server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn resolve_listen_addr(listen_addr: &str) -> Result<SocketAddr, Box<dyn std::error::Error + Send + Sync>> {
    let full = if let Some(port) = listen_addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        listen_addr.to_string()
    };
    Ok(full.parse()?)
}
