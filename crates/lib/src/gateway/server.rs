//! Gateway HTTP server (health + ticket processing).

use crate::config::Config;
use crate::pipeline::{Pipeline, PipelineError, TicketInput};
use crate::respond::TicketResponse;
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Shared state for the gateway (config + the one pipeline instance; the
/// pipeline owns the session store, so parked conversations survive across
/// requests).
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<Config>,
    pub pipeline: Arc<Pipeline>,
}

/// Inbound ticket request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRequest {
    pub message: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub vorname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Conversation token; required for the two-step identity flow.
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Accepted for API compatibility; the gateway always simulates dispatch.
    #[serde(default = "default_simulate_dispatch")]
    pub simulate_dispatch: bool,
}

fn default_simulate_dispatch() -> bool {
    true
}

/// Run the gateway server; binds to config.gateway.bind:config.gateway.port.
/// Blocks until shutdown (e.g. Ctrl+C).
pub async fn run_gateway(config: Config) -> Result<()> {
    // Same posture as the demo build: the gateway never performs live dispatch.
    let pipeline = Arc::new(Pipeline::from_config(&config, true));
    let state = GatewayState {
        config: Arc::new(config.clone()),
        pipeline,
    };

    let app = Router::new()
        .route("/", get(health_http))
        .route("/tickets", post(process_ticket))
        .with_state(state);

    let bind_addr = format!("{}:{}", config.gateway.bind.trim(), config.gateway.port);
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

async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.config.gateway.port,
    }))
}

/// POST /tickets — run one message through the pipeline. An identity-shaped
/// message without a thread id is a client error: there is no key under which
/// the parked conversation could be resumed.
async fn process_ticket(
    State(state): State<GatewayState>,
    Json(request): Json<TicketRequest>,
) -> Result<Json<TicketResponse>, (StatusCode, Json<serde_json::Value>)> {
    log::info!(
        "processing ticket request (thread_id={})",
        request.thread_id.as_deref().unwrap_or("-")
    );
    if !request.simulate_dispatch {
        log::info!("simulateDispatch=false requested but ignored; gateway always simulates");
    }

    let input = TicketInput {
        message: request.message,
        name: request.name,
        vorname: request.vorname,
        email: request.email,
        session_token: request.thread_id,
        original_message: None,
    };

    match state.pipeline.run(input).await {
        Ok(response) => {
            log::info!("ticket processed: status={}", response.status.as_str());
            Ok(Json(response))
        }
        Err(e @ PipelineError::IdentityReplyWithoutSession) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": e.to_string() })),
        )),
    }
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}
