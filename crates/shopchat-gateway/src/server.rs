// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use shopchat_config::model::GatewayConfig;
use shopchat_core::ShopchatError;
use shopchat_inbox::ConversationService;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub service: Arc<ConversationService>,
    pub auth: AuthConfig,
    /// Token expected in the webhook subscription handshake.
    pub verify_token: Option<String>,
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
}

impl GatewayState {
    pub fn new(service: Arc<ConversationService>, config: &GatewayConfig) -> Self {
        Self {
            service,
            auth: AuthConfig::new(config.bearer_token.clone()),
            verify_token: config
                .verify_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Build the gateway routes:
/// - GET /health (public)
/// - GET, POST /webhooks/{channel} (public, always acknowledged)
/// - /api/chat/... inbox API (bearer auth)
/// - GET /ws dashboard events (token via query param)
pub fn router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route(
            "/webhooks/{channel}",
            get(handlers::verify_webhook).post(handlers::receive_webhook),
        )
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/chat/sessions", get(handlers::list_sessions))
        .route("/api/chat/unread", get(handlers::unread_total))
        .route(
            "/api/chat/customers/{id}/messages",
            get(handlers::list_messages).post(handlers::send_message),
        )
        .route("/api/chat/customers/{id}/read", post(handlers::mark_read))
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the gateway until `shutdown` is cancelled.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), ShopchatError> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ShopchatError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| ShopchatError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
