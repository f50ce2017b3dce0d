// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket feed of inbox events for dashboards.
//!
//! `GET /ws` joins the admin audience; `GET /ws?customer_id=7` joins that
//! customer's private audience. When a bearer token is configured it is
//! passed as `?token=`.
//!
//! Server -> Client (JSON text frames):
//! ```json
//! {"id": "...", "at": "...", "event": "new-message", "data": {...}}
//! {"id": "...", "at": "...", "event": "unread-count", "data": {"total": 3}}
//! ```
//!
//! Client frames other than close are ignored.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shopchat_bus::{Audience, Subscription};

use crate::server::GatewayState;

/// Query parameters of the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub customer_id: Option<i64>,
    #[serde(default)]
    pub token: Option<String>,
}

impl WsParams {
    pub fn audience(&self) -> Audience {
        self.customer_id.map_or(Audience::Admin, Audience::Customer)
    }
}

/// WebSocket upgrade handler.
///
/// Subscribes before upgrading so no event published during the handshake
/// is missed.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<GatewayState>,
) -> Response {
    if !state.auth.accepts(params.token.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let subscription = state.service.bus().subscribe(params.audience());
    ws.on_upgrade(move |socket| handle_socket(socket, subscription))
}

/// Forward events to the client until either side goes away.
async fn handle_socket(socket: WebSocket, mut subscription: Subscription) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let audience = subscription.audience();
    tracing::debug!(%audience, "dashboard connected");

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(envelope) = event else { break };
                let frame = envelope.to_json();
                if frame.is_empty() {
                    continue;
                }
                if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!(%audience, "dashboard disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_pick_audience() {
        let admin: WsParams = serde_json::from_str("{}").unwrap();
        assert_eq!(admin.audience(), Audience::Admin);

        let customer: WsParams = serde_json::from_str(r#"{"customer_id": 7}"#).unwrap();
        assert_eq!(customer.audience(), Audience::Customer(7));
    }
}
