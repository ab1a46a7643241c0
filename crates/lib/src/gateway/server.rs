//! Gateway HTTP server: webhook endpoint plus a health probe on a single port.

use crate::config::{Config, Credentials};
use crate::gateway::handler::{handle_request, GatewayState};
use crate::inbound::InboundRequest;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;

/// Build the router. `POST /` mirrors a function-URL deployment; `/slack/events` is the
/// conventional Events API request URL.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(health_http).post(webhook))
        .route("/slack/events", post(webhook))
        .with_state(state)
}

/// Run the gateway with the real OpenAI and Slack clients.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config, credentials: Credentials) -> Result<()> {
    let state = GatewayState::new(config, &credentials);
    run_gateway_with_state(state).await
}

/// Bind to `state.config.gateway` and serve until SIGINT or SIGTERM.
pub async fn run_gateway_with_state(state: GatewayState) -> Result<()> {
    let bind_addr = format!(
        "{}:{}",
        state.config.gateway.bind.trim(),
        state.config.gateway.port
    );
    log::info!(
        "boot mode {}, request verification: {}",
        state.mode,
        state.verifier.kind()
    );
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("gateway listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining in-flight requests");
}

/// POST / and /slack/events — verify, classify and answer one webhook call.
async fn webhook(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    let request = InboundRequest::new(header_map(&headers), body.to_vec());
    handle_request(&state, &request).await.into_response()
}

/// Flatten headers to a string map (first value wins; non-UTF-8 values are dropped).
fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::with_capacity(headers.len());
    for (name, value) in headers {
        if let Ok(v) = value.to_str() {
            map.entry(name.as_str().to_string())
                .or_insert_with(|| v.to_string());
        }
    }
    map
}

/// GET / returns a simple health JSON (for probes).
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "running",
        "mode": state.mode.as_str(),
        "verifier": state.verifier.kind(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_map_keeps_first_value() {
        let mut headers = HeaderMap::new();
        headers.append("x-slack-retry-num", HeaderValue::from_static("1"));
        headers.append("x-slack-retry-num", HeaderValue::from_static("2"));
        headers.insert("authorization", HeaderValue::from_static("Bearer abc"));
        let map = header_map(&headers);
        assert_eq!(map.get("x-slack-retry-num").map(String::as_str), Some("1"));
        assert_eq!(map.get("authorization").map(String::as_str), Some("Bearer abc"));
    }
}
