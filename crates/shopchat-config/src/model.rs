// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level shopchat configuration.
///
/// Every section is optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ShopchatConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Flow engine behavior.
    #[serde(default)]
    pub engine: EngineConfig,

    /// HTTP listener, admin auth and webhook verification.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Dashboard fan-out settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub whatsapp: WhatsappConfig,

    #[serde(default)]
    pub messenger: MessengerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Instance name, used in logs and the health endpoint.
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_server_name() -> String {
    "shopchat".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Deadline for a single store round-trip. A stall warning is logged and
    /// the call fails with a timeout when it elapses.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("shopchat").join("shopchat.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("shopchat.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_query_timeout_ms() -> u64 {
    5_000
}

/// How overlapping trigger matches are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPrecedence {
    /// First matching flow in listing order.
    #[default]
    ListOrder,
    /// The matching flow with the longest trigger text; list order breaks ties.
    LongestMatch,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Marker that classifies a message as a command.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    #[serde(default)]
    pub trigger_precedence: TriggerPrecedence,

    /// Upper bound for any `api_call` request.
    #[serde(default = "default_api_call_timeout_secs")]
    pub api_call_timeout_secs: u64,

    /// Response bodies beyond this size are truncated before being stored.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,

    /// Default row limit for commerce actions.
    #[serde(default = "default_action_list_limit")]
    pub action_list_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            trigger_precedence: TriggerPrecedence::default(),
            api_call_timeout_secs: default_api_call_timeout_secs(),
            max_response_bytes: default_max_response_bytes(),
            action_list_limit: default_action_list_limit(),
        }
    }
}

fn default_command_prefix() -> String {
    "/".to_string()
}

fn default_api_call_timeout_secs() -> u64 {
    10
}

fn default_max_response_bytes() -> usize {
    64 * 1024
}

fn default_action_list_limit() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required on admin API and WebSocket routes.
    /// `None` leaves them open (auth is handled upstream).
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Token expected in `hub.verify_token` during webhook subscription.
    #[serde(default)]
    pub verify_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            verify_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfig {
    /// Broadcast buffer per audience. Slow subscribers skip events past it.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    256
}

fn default_send_timeout_secs() -> u64 {
    10
}

fn default_graph_api_url() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token. `None` leaves the adapter unconfigured.
    #[serde(default)]
    pub bot_token: Option<String>,

    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,

    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_url: default_telegram_api_url(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

/// WhatsApp Cloud API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsappConfig {
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub phone_number_id: Option<String>,

    #[serde(default = "default_graph_api_url")]
    pub api_url: String,

    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for WhatsappConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            phone_number_id: None,
            api_url: default_graph_api_url(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

/// Messenger Send API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MessengerConfig {
    #[serde(default)]
    pub page_access_token: Option<String>,

    #[serde(default = "default_graph_api_url")]
    pub api_url: String,

    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            page_access_token: None,
            api_url: default_graph_api_url(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}
