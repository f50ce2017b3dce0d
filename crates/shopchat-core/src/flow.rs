// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator-authored conversation flows and the per-customer execution cursor.
//!
//! Node behavior is a closed set: every [`NodeKind`] variant carries its own
//! typed config, and the engine dispatches over it with an exhaustive match.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ShopchatError;
use crate::types::{Button, Channel, ChannelScope};

/// Variable a question node stores into when none is configured.
pub const DEFAULT_VARIABLE: &str = "response";

/// How a flow is triggered.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TriggerKind {
    /// Text beginning with the command marker, e.g. `/start`.
    Command,
    /// Any other text.
    Keyword,
}

/// A flow header as listed by the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub id: i64,
    pub name: String,
    pub channel_scope: ChannelScope,
    pub trigger_kind: TriggerKind,
    pub trigger_text: String,
    pub is_active: bool,
}

/// One step of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNode {
    pub flow_id: i64,
    /// Unique within the flow.
    pub node_id: String,
    pub kind: NodeKind,
}

/// Node behavior, one variant per node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    Message(MessageConfig),
    Question(QuestionConfig),
    Action(ActionConfig),
    Condition,
    ApiCall(ApiCallConfig),
}

impl NodeKind {
    /// The persisted `node_type` column value.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Message(_) => "message",
            NodeKind::Question(_) => "question",
            NodeKind::Action(_) => "action",
            NodeKind::Condition => "condition",
            NodeKind::ApiCall(_) => "api_call",
        }
    }

    /// Nodes that are passed through without waiting for customer input.
    pub fn is_zero_input(&self) -> bool {
        matches!(self, NodeKind::Start | NodeKind::Condition)
    }

    /// Rebuild a node from its persisted type and JSON config.
    pub fn from_parts(node_type: &str, config: &str) -> Result<Self, ShopchatError> {
        let config = if config.trim().is_empty() { "{}" } else { config };
        let parse_err = |e: serde_json::Error| {
            ShopchatError::Configuration(format!("invalid `{node_type}` node config: {e}"))
        };
        match node_type {
            "start" => Ok(NodeKind::Start),
            "condition" => Ok(NodeKind::Condition),
            "message" => serde_json::from_str(config)
                .map(NodeKind::Message)
                .map_err(parse_err),
            "question" => serde_json::from_str(config)
                .map(NodeKind::Question)
                .map_err(parse_err),
            "action" => serde_json::from_str(config)
                .map(NodeKind::Action)
                .map_err(parse_err),
            "api_call" => serde_json::from_str(config)
                .map(NodeKind::ApiCall)
                .map_err(parse_err),
            other => Err(ShopchatError::Configuration(format!(
                "unknown node type `{other}`"
            ))),
        }
    }

    /// The persisted `config` column value.
    pub fn config_json(&self) -> Result<String, ShopchatError> {
        let json = match self {
            NodeKind::Start | NodeKind::Condition => "{}".to_string(),
            NodeKind::Message(c) => serde_json::to_string(c)?,
            NodeKind::Question(c) => serde_json::to_string(c)?,
            NodeKind::Action(c) => serde_json::to_string(c)?,
            NodeKind::ApiCall(c) => serde_json::to_string(c)?,
        };
        Ok(json)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageConfig {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionConfig {
    #[serde(default)]
    pub text: String,
    /// Variable the customer's reply is stored into.
    #[serde(default = "default_variable")]
    pub variable: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

fn default_variable() -> String {
    DEFAULT_VARIABLE.to_string()
}

/// Built-in commerce reads an action node can perform.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    /// Most recently added products.
    ListProducts,
    /// Products whose name contains the text held in `query_variable`.
    SearchProducts,
    /// The current customer's latest orders.
    RecentOrders,
    /// Status of the order whose number is held in `query_variable`.
    OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub action: ActionKind,
    /// Variable supplying the search text or order number.
    #[serde(default = "default_variable")]
    pub query_variable: String,
    /// Template rendered above the listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    /// Template rendered when the read returns nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCallConfig {
    /// URL template; `{{name}}` placeholders are substituted.
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Body template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default = "default_success_message")]
    pub success_message: String,
    #[serde(default = "default_failure_message")]
    pub failure_message: String,
    /// Stores the response body under this variable on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_variable: Option<String>,
    /// Per-node timeout; never longer than the engine-wide bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_success_message() -> String {
    "Done.".to_string()
}

fn default_failure_message() -> String {
    "Sorry, we could not complete that request. Please try again later.".to_string()
}

/// Transition guard on a connection. Comparisons are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    Always,
    Equals(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
}

impl Predicate {
    /// Rebuild from the persisted `condition_kind` / `condition_value` columns.
    pub fn from_parts(kind: &str, value: Option<String>) -> Result<Self, ShopchatError> {
        let value = value.unwrap_or_default();
        match kind {
            "always" | "" => Ok(Predicate::Always),
            "equals" => Ok(Predicate::Equals(value)),
            "contains" => Ok(Predicate::Contains(value)),
            "starts_with" => Ok(Predicate::StartsWith(value)),
            "ends_with" => Ok(Predicate::EndsWith(value)),
            other => Err(ShopchatError::Configuration(format!(
                "unknown connection condition `{other}`"
            ))),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Predicate::Always => "always",
            Predicate::Equals(_) => "equals",
            Predicate::Contains(_) => "contains",
            Predicate::StartsWith(_) => "starts_with",
            Predicate::EndsWith(_) => "ends_with",
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Predicate::Always => None,
            Predicate::Equals(v)
            | Predicate::Contains(v)
            | Predicate::StartsWith(v)
            | Predicate::EndsWith(v) => Some(v),
        }
    }
}

/// A directed, guarded edge. Outgoing edges of a node are evaluated in
/// listing order and the first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConnection {
    pub flow_id: i64,
    pub source_node_id: String,
    pub target_node_id: String,
    pub predicate: Predicate,
}

/// The live cursor of one customer inside one flow instance.
///
/// At most one non-completed state exists per customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub id: i64,
    pub customer_id: i64,
    pub flow_id: i64,
    pub current_node_id: String,
    pub variables: BTreeMap<String, String>,
    pub channel: Channel,
    pub completed: bool,
    /// Bumped on every persisted advance; writes are conditional on it.
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// A complete flow for import: header, nodes and connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowBundle {
    pub name: String,
    #[serde(default = "default_scope")]
    pub channel_scope: ChannelScope,
    pub trigger_kind: TriggerKind,
    pub trigger_text: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub nodes: Vec<BundleNode>,
    #[serde(default)]
    pub connections: Vec<BundleConnection>,
}

fn default_scope() -> ChannelScope {
    ChannelScope::All
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleNode {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleConnection {
    pub from: String,
    pub to: String,
    #[serde(default = "always")]
    pub when: Predicate,
}

fn always() -> Predicate {
    Predicate::Always
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_kind_round_trips_through_parts() {
        let kind = NodeKind::Question(QuestionConfig {
            text: "Favourite colour?".into(),
            variable: "color".into(),
            buttons: vec![Button::new("Blue")],
            image_url: None,
        });
        let json = kind.config_json().unwrap();
        let parsed = NodeKind::from_parts(kind.type_name(), &json).unwrap();
        assert_eq!(parsed, kind);
    }

    #[test]
    fn question_variable_defaults_to_response() {
        let kind = NodeKind::from_parts("question", r#"{"text":"Name?"}"#).unwrap();
        match kind {
            NodeKind::Question(cfg) => assert_eq!(cfg.variable, "response"),
            other => panic!("expected question, got {other:?}"),
        }
    }

    #[test]
    fn empty_config_is_accepted_for_zero_input_nodes() {
        assert_eq!(NodeKind::from_parts("start", "").unwrap(), NodeKind::Start);
        assert_eq!(
            NodeKind::from_parts("condition", "null").unwrap(),
            NodeKind::Condition
        );
    }

    #[test]
    fn unknown_node_type_is_a_configuration_error() {
        let err = NodeKind::from_parts("webhook", "{}").unwrap_err();
        assert!(matches!(err, ShopchatError::Configuration(_)));
    }

    #[test]
    fn malformed_action_config_is_a_configuration_error() {
        let err = NodeKind::from_parts("action", r#"{"action":"launch_rocket"}"#).unwrap_err();
        assert!(err.to_string().contains("action"));
    }

    #[test]
    fn predicate_parts() {
        let p = Predicate::from_parts("starts_with", Some("ord".into())).unwrap();
        assert_eq!(p, Predicate::StartsWith("ord".into()));
        assert_eq!(p.kind_name(), "starts_with");
        assert_eq!(p.value(), Some("ord"));
        assert_eq!(Predicate::from_parts("always", None).unwrap(), Predicate::Always);
        assert!(Predicate::from_parts("regex", None).is_err());
    }

    #[test]
    fn bundle_deserializes_from_json() {
        let json = r#"{
            "name": "Main menu",
            "trigger_kind": "command",
            "trigger_text": "/start",
            "nodes": [
                {"id": "start", "type": "start"},
                {"id": "menu", "type": "message", "text": "Reply 1 for products"},
                {"id": "products", "type": "action", "action": "list_products"}
            ],
            "connections": [
                {"from": "start", "to": "menu"},
                {"from": "menu", "to": "products", "when": {"kind": "equals", "value": "1"}}
            ]
        }"#;
        let bundle: FlowBundle = serde_json::from_str(json).unwrap();
        assert_eq!(bundle.channel_scope, ChannelScope::All);
        assert!(bundle.is_active);
        assert_eq!(bundle.nodes.len(), 3);
        assert_eq!(bundle.nodes[0].kind, NodeKind::Start);
        assert_eq!(bundle.connections[0].when, Predicate::Always);
        assert_eq!(bundle.connections[1].when, Predicate::Equals("1".into()));
    }
}
