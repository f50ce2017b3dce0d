// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token authentication for the inbox API and dashboard socket.
//!
//! Operator authentication proper lives in front of this service; the token
//! here only keeps the API off the open network. With no token configured
//! every request is let through.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Authentication configuration for the gateway.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Expected bearer token. If `None`, the API is open.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl AuthConfig {
    pub fn new(bearer_token: Option<String>) -> Self {
        Self {
            bearer_token: bearer_token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Whether a presented token grants access.
    pub fn accepts(&self, presented: Option<&str>) -> bool {
        match &self.bearer_token {
            None => true,
            Some(expected) => presented == Some(expected.as_str()),
        }
    }
}

/// Middleware that validates `Authorization: Bearer <token>`.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if auth.accepts(presented) {
        Ok(next.run(request).await)
    } else {
        tracing::debug!("inbox API request rejected: bad or missing bearer token");
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_when_no_token() {
        let config = AuthConfig::new(None);
        assert!(config.accepts(None));
        assert!(config.accepts(Some("anything")));
    }

    #[test]
    fn blank_token_counts_as_none() {
        assert!(AuthConfig::new(Some("  ".into())).bearer_token.is_none());
    }

    #[test]
    fn token_must_match() {
        let config = AuthConfig::new(Some("secret-token".into()));
        assert!(config.accepts(Some("secret-token")));
        assert!(!config.accepts(Some("wrong")));
        assert!(!config.accepts(None));
    }

    #[test]
    fn auth_config_debug_redacts_token() {
        let config = AuthConfig::new(Some("secret-token".into()));
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("secret-token"));
        assert!(debug_output.contains("[redacted]"));
    }
}
