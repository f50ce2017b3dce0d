// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::ShopchatConfig;

/// Check semantic constraints serde cannot express.
///
/// Collects every failure instead of stopping at the first.
pub fn validate_config(config: &ShopchatConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }
    if config.storage.query_timeout_ms == 0 {
        fail("storage.query_timeout_ms must be greater than 0".to_string());
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        fail("gateway.host must not be empty".to_string());
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        fail(format!(
            "gateway.host `{host}` is not a valid IP address or hostname"
        ));
    }

    let prefix = &config.engine.command_prefix;
    if prefix.trim().is_empty() {
        fail("engine.command_prefix must not be empty".to_string());
    } else if prefix.chars().any(char::is_whitespace) {
        fail(format!(
            "engine.command_prefix `{prefix}` must not contain whitespace"
        ));
    }
    if config.engine.api_call_timeout_secs == 0 {
        fail("engine.api_call_timeout_secs must be greater than 0".to_string());
    }
    if config.engine.max_response_bytes == 0 {
        fail("engine.max_response_bytes must be greater than 0".to_string());
    }
    if config.engine.action_list_limit == 0 {
        fail("engine.action_list_limit must be greater than 0".to_string());
    }

    if config.realtime.channel_capacity == 0 {
        fail("realtime.channel_capacity must be greater than 0".to_string());
    }

    for (section, secs) in [
        ("telegram", config.telegram.send_timeout_secs),
        ("whatsapp", config.whatsapp.send_timeout_secs),
        ("messenger", config.messenger.send_timeout_secs),
    ] {
        if secs == 0 {
            fail(format!("{section}.send_timeout_secs must be greater than 0"));
        }
    }

    if config.whatsapp.access_token.is_some() && config.whatsapp.phone_number_id.is_none() {
        fail("whatsapp.phone_number_id is required when whatsapp.access_token is set".to_string());
    }

    for (key, token) in [
        ("gateway.bearer_token", &config.gateway.bearer_token),
        ("gateway.verify_token", &config.gateway.verify_token),
    ] {
        if token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            fail(format!("{key} must not be blank when set"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
