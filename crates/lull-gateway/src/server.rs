// SPDX-FileCopyrightText: 2026 Lull Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use lull_buffer::DebounceBuffer;
use lull_config::model::{BufferConfig, GatewayConfig};
use lull_conversation::ConversationResolver;
use lull_core::{FlushEvent, KvStore, LullError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;
use crate::sse;

/// State for the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Store whose health is reported.
    pub store: Arc<dyn KvStore>,
}

/// Timings the webhook handlers apply.
#[derive(Debug, Clone, Copy)]
pub struct IngressTimings {
    /// Debounce window for inbound messages.
    pub window: Duration,
    /// Delay before a paused/available presence is applied as idle.
    pub presence_idle_delay: Duration,
}

impl From<&BufferConfig> for IngressTimings {
    fn from(config: &BufferConfig) -> Self {
        Self {
            window: config.window(),
            presence_idle_delay: config.presence_idle_delay(),
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub resolver: ConversationResolver,
    pub engine: DebounceBuffer,
    /// Flush events fanned out to SSE subscribers.
    pub events: broadcast::Sender<FlushEvent>,
    pub timings: IngressTimings,
    /// Authentication configuration.
    pub auth: AuthConfig,
    /// Health state for unauthenticated endpoints.
    pub health: HealthState,
    /// Delayed presence updates still waiting to be applied.
    pub tasks: TaskTracker,
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

impl From<&GatewayConfig> for ServerConfig {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// Builds the full route table.
///
/// - `GET /health` (public)
/// - `POST /v1/webhook/{agent_id}/messages`
/// - `POST /v1/webhook/{agent_id}/presence`
/// - `GET /v1/conversations/{id}/activity`
/// - `POST /v1/conversations/{id}/flush`
/// - `GET /v1/events` (SSE)
pub fn router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/v1/webhook/{agent_id}/messages",
            post(handlers::post_webhook_message),
        )
        .route(
            "/v1/webhook/{agent_id}/presence",
            post(handlers::post_webhook_presence),
        )
        .route(
            "/v1/conversations/{id}/activity",
            get(handlers::get_activity),
        )
        .route("/v1/conversations/{id}/flush", post(handlers::post_flush))
        .route("/v1/events", get(sse::get_events))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds the gateway listener.
pub async fn bind(config: &ServerConfig) -> Result<tokio::net::TcpListener, LullError> {
    let addr = format!("{}:{}", config.host, config.port);
    tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LullError::Gateway {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })
}

/// Serves on an already bound listener until `cancel` fires.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), LullError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "gateway server listening");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| LullError::Gateway {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway server stopped");
    Ok(())
}

/// Binds and serves until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), LullError> {
    let listener = bind(config).await?;
    serve(listener, state, cancel).await
}
