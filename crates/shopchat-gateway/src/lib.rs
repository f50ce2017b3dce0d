// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface of shopchat.
//!
//! Channel webhooks are acknowledged immediately and processed in the
//! background. The inbox API and the dashboard WebSocket serve the operator
//! inbox on top of the same [`ConversationService`](shopchat_inbox::ConversationService).

pub mod auth;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::AuthConfig;
pub use server::{GatewayState, router, start_server};
