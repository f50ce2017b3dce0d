// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for webhooks and the inbox API.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use shopchat_core::{
    Channel, ChatMessage, ChatSession, ChatStore, HealthStatus, PluginAdapter, ReadReceipt,
    ShopchatError, StoredMessage,
};
use tracing::{debug, warn};

use crate::server::GatewayState;

const DEFAULT_HISTORY_LIMIT: u32 = 50;
const MAX_HISTORY_LIMIT: u32 = 200;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A [`ShopchatError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ShopchatError);

impl From<ShopchatError> for ApiError {
    fn from(e: ShopchatError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ShopchatError::NotFound { .. } | ShopchatError::AdapterNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            ShopchatError::Channel { .. } => StatusCode::BAD_GATEWAY,
            ShopchatError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!(error = %self.0, "inbox API request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Per-network adapter status.
    pub channels: BTreeMap<String, String>,
}

fn describe(status: &HealthStatus) -> String {
    match status {
        HealthStatus::Healthy => "healthy".to_string(),
        HealthStatus::Degraded(reason) => format!("degraded: {reason}"),
        HealthStatus::Unhealthy(reason) => format!("unhealthy: {reason}"),
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let registry = state.service.channels();
    let mut channels = BTreeMap::new();
    for channel in registry.channels() {
        let status = match registry.get(channel) {
            Ok(adapter) => match adapter.health_check().await {
                Ok(status) => describe(&status),
                Err(e) => format!("unhealthy: {e}"),
            },
            Err(e) => format!("unhealthy: {e}"),
        };
        channels.insert(channel.to_string(), status);
    }

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        channels,
    })
}

fn parse_channel(raw: &str) -> Option<Channel> {
    Channel::from_str(raw).ok()
}

/// POST /webhooks/{channel}
///
/// Acknowledges with 200 before processing so the network never retries;
/// the body is handled on a background task.
pub async fn receive_webhook(
    State(state): State<GatewayState>,
    Path(channel): Path<String>,
    body: Bytes,
) -> StatusCode {
    let Some(channel) = parse_channel(&channel) else {
        return StatusCode::NOT_FOUND;
    };
    match serde_json::from_slice::<serde_json::Value>(&body) {
        Ok(raw) => state.service.accept_webhook(channel, raw),
        Err(e) => warn!(%channel, error = %e, "webhook body is not JSON, ignoring"),
    }
    StatusCode::OK
}

/// GET /webhooks/{channel}
///
/// Subscription handshake: echoes `hub.challenge` when `hub.verify_token`
/// matches the configured token.
pub async fn verify_webhook(
    State(state): State<GatewayState>,
    Path(channel): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(channel) = parse_channel(&channel) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge");

    match (&state.verify_token, mode, challenge) {
        (Some(expected), Some("subscribe"), Some(challenge))
            if token == Some(expected.as_str()) =>
        {
            debug!(%channel, "webhook subscription verified");
            (StatusCode::OK, challenge.clone()).into_response()
        }
        _ => {
            warn!(%channel, "webhook verification rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// GET /api/chat/sessions
pub async fn list_sessions(
    State(state): State<GatewayState>,
) -> Result<Json<Vec<ChatSession>>, ApiError> {
    Ok(Json(state.service.store().list_sessions().await?))
}

#[derive(Debug, Serialize)]
pub struct UnreadResponse {
    pub total: i64,
}

/// GET /api/chat/unread
pub async fn unread_total(
    State(state): State<GatewayState>,
) -> Result<Json<UnreadResponse>, ApiError> {
    let total = state.service.store().unread_total().await?;
    Ok(Json(UnreadResponse { total }))
}

/// Query for GET /api/chat/customers/{id}/messages.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub before_id: Option<i64>,
}

/// GET /api/chat/customers/{id}/messages
///
/// A page of history, oldest first. Page backwards with `before_id`.
pub async fn list_messages(
    State(state): State<GatewayState>,
    Path(customer_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ChatMessage>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let messages = state
        .service
        .store()
        .list_messages(customer_id, limit, query.before_id)
        .await?;
    Ok(Json(messages))
}

/// Request body for POST /api/chat/customers/{id}/messages.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub text: String,
}

/// POST /api/chat/customers/{id}/messages
pub async fn send_message(
    State(state): State<GatewayState>,
    Path(customer_id): Path<i64>,
    Json(body): Json<SendRequest>,
) -> Response {
    if body.text.trim().is_empty() {
        return bad_request("text must not be empty");
    }
    match state
        .service
        .send_admin_message(customer_id, &body.text)
        .await
    {
        Ok(stored) => (StatusCode::CREATED, Json::<StoredMessage>(stored)).into_response(),
        Err(e) => ApiError(e).into_response(),
    }
}

/// POST /api/chat/customers/{id}/read
pub async fn mark_read(
    State(state): State<GatewayState>,
    Path(customer_id): Path<i64>,
) -> Result<Json<ReadReceipt>, ApiError> {
    Ok(Json(state.service.mark_read(customer_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_statuses() {
        let status = |e: ShopchatError| ApiError(e).into_response().status();
        assert_eq!(status(ShopchatError::not_found("customer", 3)), StatusCode::NOT_FOUND);
        assert_eq!(status(ShopchatError::channel("down")), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status(ShopchatError::Timeout {
                duration: std::time::Duration::from_secs(1)
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status(ShopchatError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn history_query_defaults() {
        let q: HistoryQuery = serde_json::from_str("{}").unwrap();
        assert!(q.limit.is_none());
        assert!(q.before_id.is_none());
    }

    #[test]
    fn health_descriptions() {
        assert_eq!(describe(&HealthStatus::Healthy), "healthy");
        assert_eq!(
            describe(&HealthStatus::Degraded("bot_token not set".into())),
            "degraded: bot_token not set"
        );
    }
}
