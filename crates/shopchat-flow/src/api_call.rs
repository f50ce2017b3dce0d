// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound HTTP calls for `api_call` nodes.
//!
//! Every request is bounded by the engine-wide timeout. Failures never leave
//! this module: they are logged and rendered as the node's failure message.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Url};
use serde_json::{Value, json};
use shopchat_config::model::EngineConfig;
use shopchat_core::flow::{ApiCallConfig, HttpMethod};
use shopchat_core::{OutboundMessage, RenderedResponse, ShopchatError};
use tracing::{debug, warn};

use crate::template;

#[derive(Debug, Clone)]
pub struct ApiCaller {
    client: Client,
    max_timeout: Duration,
    max_response_bytes: usize,
}

impl ApiCaller {
    pub fn new(config: &EngineConfig) -> Result<Self, ShopchatError> {
        let max_timeout = Duration::from_secs(config.api_call_timeout_secs.max(1));
        let client = Client::builder()
            .timeout(max_timeout)
            .build()
            .map_err(|e| ShopchatError::Http {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            max_timeout,
            max_response_bytes: config.max_response_bytes,
        })
    }

    /// Perform the call and render the node's success or failure message.
    ///
    /// On success the (truncated) body is stored under `response_variable`,
    /// and top-level scalar fields of a JSON object body as
    /// `response_variable.field`.
    pub async fn call(
        &self,
        config: &ApiCallConfig,
        variables: &mut BTreeMap<String, String>,
    ) -> RenderedResponse {
        match self.execute(config, variables).await {
            Ok((status, body)) => {
                let parsed = serde_json::from_str::<Value>(&body).ok();
                if let Some(var) = &config.response_variable {
                    store_response(var, &body, parsed.as_ref(), variables);
                }
                let text = template::render(&config.success_message, variables).into_owned();
                RenderedResponse {
                    message: OutboundMessage::text(text),
                    payload: Some(json!({
                        "status": status,
                        "body": parsed.unwrap_or(Value::String(body)),
                    })),
                }
            }
            Err(e) => {
                warn!(url = %config.url, error = %e, "api_call failed");
                let text = template::render(&config.failure_message, variables).into_owned();
                RenderedResponse {
                    message: OutboundMessage::text(text),
                    payload: Some(json!({ "error": e.to_string() })),
                }
            }
        }
    }

    fn timeout_for(&self, config: &ApiCallConfig) -> Duration {
        config
            .timeout_secs
            .filter(|s| *s > 0)
            .map_or(self.max_timeout, |s| Duration::from_secs(s).min(self.max_timeout))
    }

    async fn execute(
        &self,
        config: &ApiCallConfig,
        variables: &BTreeMap<String, String>,
    ) -> Result<(u16, String), ShopchatError> {
        let raw_url = template::render(&config.url, variables);
        let url = Url::parse(raw_url.trim()).map_err(|e| {
            ShopchatError::Configuration(format!("invalid api_call url `{raw_url}`: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ShopchatError::Configuration(format!(
                "api_call url must be http or https, got `{}`",
                url.scheme()
            )));
        }

        let timeout = self.timeout_for(config);
        let mut request = self
            .client
            .request(method(config.method), url.clone())
            .timeout(timeout);
        for (name, value) in &config.headers {
            let value = template::render(value, variables).into_owned();
            request = request.header(name.as_str(), value);
        }
        if let Some(body) = &config.body {
            let body = template::render(body, variables).into_owned();
            let has_content_type = config
                .headers
                .keys()
                .any(|k| k.eq_ignore_ascii_case(CONTENT_TYPE.as_str()));
            if !has_content_type && serde_json::from_str::<Value>(&body).is_ok() {
                request = request.header(CONTENT_TYPE, "application/json");
            }
            request = request.body(body);
        }

        let limit = self.max_response_bytes;
        let exchange = async {
            let response = request.send().await.map_err(|e| ShopchatError::Http {
                message: format!("request to {url} failed: {e}"),
                source: Some(Box::new(e)),
            })?;
            let status = response.status();
            debug!(%url, status = %status, "api_call response received");
            let bytes = response.bytes().await.map_err(|e| ShopchatError::Http {
                message: format!("failed to read response body: {e}"),
                source: Some(Box::new(e)),
            })?;
            let body = String::from_utf8_lossy(&bytes[..bytes.len().min(limit)]).into_owned();
            if !status.is_success() {
                return Err(ShopchatError::Http {
                    message: format!("{url} returned {status}: {body}"),
                    source: None,
                });
            }
            Ok((status.as_u16(), body))
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| ShopchatError::Timeout { duration: timeout })?
    }
}

fn method(m: HttpMethod) -> Method {
    match m {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn store_response(
    var: &str,
    body: &str,
    parsed: Option<&Value>,
    variables: &mut BTreeMap<String, String>,
) {
    variables.insert(var.to_string(), body.to_string());
    let Some(Value::Object(fields)) = parsed else {
        return;
    };
    for (key, value) in fields {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        variables.insert(format!("{var}.{key}"), text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method as http_method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn caller(timeout_secs: u64) -> ApiCaller {
        ApiCaller::new(&EngineConfig {
            api_call_timeout_secs: timeout_secs,
            max_response_bytes: 64,
            ..EngineConfig::default()
        })
        .unwrap()
    }

    fn node(url: String) -> ApiCallConfig {
        ApiCallConfig {
            url,
            method: HttpMethod::Get,
            headers: BTreeMap::new(),
            body: None,
            success_message: "Status: {{order.status}}".into(),
            failure_message: "Could not reach {{shop}}.".into(),
            response_variable: Some("order".into()),
            timeout_secs: None,
        }
    }

    #[tokio::test]
    async fn success_stores_fields_and_renders() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(path("/orders/ORD-7"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "shipped", "items": 2})),
            )
            .mount(&server)
            .await;

        let mut vars = BTreeMap::from([("response".to_string(), "ORD-7".to_string())]);
        let out = caller(5)
            .call(&node(format!("{}/orders/{{{{response}}}}", server.uri())), &mut vars)
            .await;

        assert_eq!(out.message.text, "Status: shipped");
        assert_eq!(vars.get("order.items").map(String::as_str), Some("2"));
        assert!(vars.contains_key("order"));
        assert_eq!(out.payload.unwrap()["status"], 200);
    }

    #[tokio::test]
    async fn post_renders_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(http_method("POST"))
            .and(path("/subscribe"))
            .and(header("x-shop", "kim"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"email":"kim@example.com"}"#))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let mut cfg = node(format!("{}/subscribe", server.uri()));
        cfg.method = HttpMethod::Post;
        cfg.headers.insert("x-shop".into(), "{{name}}".into());
        cfg.body = Some(r#"{"email":"{{email}}"}"#.into());
        cfg.success_message = "Subscribed {{email}}".into();
        cfg.response_variable = None;
        let mut vars = BTreeMap::from([
            ("name".to_string(), "kim".to_string()),
            ("email".to_string(), "kim@example.com".to_string()),
        ]);

        let out = caller(5).call(&cfg, &mut vars).await;
        assert_eq!(out.message.text, "Subscribed kim@example.com");
    }

    #[tokio::test]
    async fn non_success_status_renders_failure() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&server)
            .await;

        let mut vars = BTreeMap::from([("shop".to_string(), "the shop".to_string())]);
        let out = caller(5).call(&node(server.uri()), &mut vars).await;
        assert_eq!(out.message.text, "Could not reach the shop.");
        assert!(!vars.contains_key("order"));
        assert!(out.payload.unwrap()["error"].as_str().unwrap().contains("503"));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out_into_failure() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let mut vars = BTreeMap::new();
        let started = std::time::Instant::now();
        let out = caller(1).call(&node(server.uri()), &mut vars).await;
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(out.message.text, "Could not reach {{shop}}.");
    }

    #[tokio::test]
    async fn bad_url_is_a_failure_not_a_panic() {
        let mut vars = BTreeMap::new();
        let out = caller(5).call(&node("ftp://example.com/x".into()), &mut vars).await;
        assert_eq!(out.message.text, "Could not reach {{shop}}.");

        let out = caller(5).call(&node("{{missing}}/x".into()), &mut vars).await;
        assert_eq!(out.message.text, "Could not reach {{shop}}.");
    }

    #[tokio::test]
    async fn large_bodies_are_truncated() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(500)))
            .mount(&server)
            .await;

        let mut vars = BTreeMap::new();
        caller(5).call(&node(server.uri()), &mut vars).await;
        assert_eq!(vars.get("order").map(String::len), Some(64));
    }

    #[test]
    fn node_timeout_is_capped_by_engine_bound() {
        let c = caller(10);
        let mut cfg = node("http://localhost".into());
        assert_eq!(c.timeout_for(&cfg), Duration::from_secs(10));
        cfg.timeout_secs = Some(3);
        assert_eq!(c.timeout_for(&cfg), Duration::from_secs(3));
        cfg.timeout_secs = Some(60);
        assert_eq!(c.timeout_for(&cfg), Duration::from_secs(10));
    }
}
