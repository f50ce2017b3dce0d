// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The flow state machine.
//!
//! [`FlowEngine::process_message`] either continues the customer's active
//! execution state or starts a new one from a matching trigger, walks the
//! graph until it reaches a node that produces output, and persists the
//! cursor. Each call yields at most one rendered response.

use std::collections::HashSet;
use std::sync::Arc;

use shopchat_config::model::EngineConfig;
use shopchat_core::flow::{MessageConfig, QuestionConfig};
use shopchat_core::{
    Button, Channel, CommerceReader, ExecutionState, ExecutionStateRepository, FlowNode,
    FlowRepository, NodeKind, OutboundMessage, RenderedResponse, ShopchatError,
};
use tracing::{debug, info, warn};

use crate::api_call::ApiCaller;
use crate::locks::CustomerLocks;
use crate::{actions, predicate, template, trigger};

/// What one pass over the graph did outside the database.
#[derive(Debug, Default)]
struct Attempt {
    called_out: bool,
}

/// Drives customers through operator-authored flows.
pub struct FlowEngine {
    flows: Arc<dyn FlowRepository>,
    states: Arc<dyn ExecutionStateRepository>,
    commerce: Arc<dyn CommerceReader>,
    api: ApiCaller,
    config: EngineConfig,
    locks: CustomerLocks,
}

impl FlowEngine {
    pub fn new(
        flows: Arc<dyn FlowRepository>,
        states: Arc<dyn ExecutionStateRepository>,
        commerce: Arc<dyn CommerceReader>,
        config: EngineConfig,
    ) -> Result<Self, ShopchatError> {
        let api = ApiCaller::new(&config)?;
        info!(
            command_prefix = config.command_prefix.as_str(),
            precedence = ?config.trigger_precedence,
            "flow engine initialized"
        );
        Ok(Self {
            flows,
            states,
            commerce,
            api,
            config,
            locks: CustomerLocks::new(),
        })
    }

    /// Feed one inbound message to the customer's conversation.
    ///
    /// Never fails: lookup, persistence and configuration errors are logged
    /// and turned into `None` so channel delivery is never blocked by a flow.
    /// Calls for the same customer are serialized. A save that loses to a
    /// concurrent advance is retried once, unless the failed pass already
    /// made an outbound api_call request.
    pub async fn process_message(
        &self,
        customer_id: i64,
        text: &str,
        channel: Channel,
    ) -> Option<RenderedResponse> {
        let _guard = self.locks.acquire(customer_id).await;

        let mut attempt = Attempt::default();
        let result = match self.try_process(customer_id, text, channel, &mut attempt).await {
            Err(ShopchatError::Conflict(reason)) if !attempt.called_out => {
                debug!(customer_id, %reason, "execution state moved underneath us, retrying");
                self.try_process(customer_id, text, channel, &mut Attempt::default())
                    .await
            }
            other => other,
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                warn!(customer_id, channel = %channel, error = %e, "flow processing failed");
                None
            }
        }
    }

    async fn try_process(
        &self,
        customer_id: i64,
        text: &str,
        channel: Channel,
        attempt: &mut Attempt,
    ) -> Result<Option<RenderedResponse>, ShopchatError> {
        match self.states.active_state(customer_id).await? {
            Some(state) => self.continue_flow(state, text, attempt).await,
            None => self.start_flow(customer_id, text, channel, attempt).await,
        }
    }

    async fn start_flow(
        &self,
        customer_id: i64,
        text: &str,
        channel: Channel,
        attempt: &mut Attempt,
    ) -> Result<Option<RenderedResponse>, ShopchatError> {
        let flows = self.flows.list_active_flows().await?;
        let Some(flow) = trigger::select(
            &flows,
            text,
            channel,
            &self.config.command_prefix,
            self.config.trigger_precedence,
        ) else {
            return Ok(None);
        };

        let Some(start) = self.flows.find_start_node(flow.id).await? else {
            warn!(flow_id = flow.id, "triggered flow has no start node");
            return Ok(None);
        };

        let state = self
            .states
            .create_state(customer_id, flow.id, &start.node_id, channel)
            .await?;
        info!(customer_id, flow_id = flow.id, channel = %channel, "flow started");
        self.run_from(state, start, text, attempt).await
    }

    async fn continue_flow(
        &self,
        mut state: ExecutionState,
        text: &str,
        attempt: &mut Attempt,
    ) -> Result<Option<RenderedResponse>, ShopchatError> {
        let Some(node) = self
            .flows
            .get_node(state.flow_id, &state.current_node_id)
            .await?
        else {
            warn!(
                state_id = state.id,
                node_id = state.current_node_id.as_str(),
                "current node no longer exists, ending flow"
            );
            self.complete(state).await?;
            return Ok(None);
        };

        if let NodeKind::Question(q) = &node.kind {
            state.variables.insert(q.variable.clone(), text.to_string());
        }

        let edges = self
            .flows
            .outgoing_connections(state.flow_id, &node.node_id)
            .await?;
        let Some(edge) = predicate::first_match(&edges, text) else {
            debug!(state_id = state.id, node_id = node.node_id.as_str(), "no connection matched");
            self.complete(state).await?;
            return Ok(None);
        };

        let next = self.require_node(state.flow_id, &edge.target_node_id).await;
        match next {
            Ok(next) => self.run_from(state, next, text, attempt).await,
            Err(e) => {
                self.complete(state).await?;
                Err(e)
            }
        }
    }

    /// Enter `node`, then persist wherever the walk stopped.
    ///
    /// A broken graph completes the state so the customer is not stuck on it.
    async fn run_from(
        &self,
        mut state: ExecutionState,
        node: FlowNode,
        text: &str,
        attempt: &mut Attempt,
    ) -> Result<Option<RenderedResponse>, ShopchatError> {
        match self.enter(&mut state, node, text, attempt).await {
            Ok(response) => {
                let saved = self.states.save_state(&state).await?;
                if saved.completed {
                    info!(customer_id = saved.customer_id, flow_id = saved.flow_id, "flow completed");
                }
                Ok(response)
            }
            Err(e @ (ShopchatError::Configuration(_) | ShopchatError::NotFound { .. })) => {
                if let Err(save_err) = self.complete(state).await {
                    warn!(error = %save_err, "failed to close broken execution state");
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Walk from `node` through zero-input nodes to the first node that
    /// produces output, leaving the cursor there.
    async fn enter(
        &self,
        state: &mut ExecutionState,
        mut node: FlowNode,
        text: &str,
        attempt: &mut Attempt,
    ) -> Result<Option<RenderedResponse>, ShopchatError> {
        let mut visited = HashSet::new();
        loop {
            if !visited.insert(node.node_id.clone()) {
                return Err(ShopchatError::Configuration(format!(
                    "flow {} cycles back to node `{}` without waiting for input",
                    state.flow_id, node.node_id
                )));
            }
            state.current_node_id = node.node_id.clone();

            let response = match &node.kind {
                NodeKind::Start | NodeKind::Condition => None,
                NodeKind::Question(q) => return Ok(Some(render_question(q, state))),
                NodeKind::Message(m) => Some(render_message(m, state)),
                NodeKind::Action(a) => {
                    let text = actions::run(
                        self.commerce.as_ref(),
                        a,
                        state.customer_id,
                        &state.variables,
                        self.config.action_list_limit,
                    )
                    .await?;
                    Some(RenderedResponse::text(text))
                }
                NodeKind::ApiCall(c) => {
                    attempt.called_out = true;
                    Some(self.api.call(c, &mut state.variables).await)
                }
            };

            let Some(response) = response else {
                let edges = self
                    .flows
                    .outgoing_connections(state.flow_id, &node.node_id)
                    .await?;
                let edge = if matches!(node.kind, NodeKind::Start) {
                    edges.first()
                } else {
                    predicate::first_match(&edges, text)
                };
                let Some(edge) = edge else {
                    debug!(node_id = node.node_id.as_str(), "zero-input node has no way forward");
                    state.completed = true;
                    return Ok(None);
                };
                node = self.require_node(state.flow_id, &edge.target_node_id).await?;
                continue;
            };

            let onward = self
                .flows
                .outgoing_connections(state.flow_id, &node.node_id)
                .await?;
            if onward.is_empty() {
                state.completed = true;
            }
            return Ok(Some(response));
        }
    }

    async fn require_node(&self, flow_id: i64, node_id: &str) -> Result<FlowNode, ShopchatError> {
        self.flows
            .get_node(flow_id, node_id)
            .await?
            .ok_or_else(|| ShopchatError::not_found("flow node", format!("{flow_id}/{node_id}")))
    }

    async fn complete(&self, mut state: ExecutionState) -> Result<(), ShopchatError> {
        state.completed = true;
        self.states.save_state(&state).await?;
        debug!(customer_id = state.customer_id, flow_id = state.flow_id, "flow completed");
        Ok(())
    }
}

fn render_buttons(buttons: &[Button], state: &ExecutionState) -> Vec<Button> {
    buttons
        .iter()
        .map(|b| Button {
            label: template::render(&b.label, &state.variables).into_owned(),
            payload: b
                .payload
                .as_ref()
                .map(|p| template::render(p, &state.variables).into_owned()),
        })
        .collect()
}

fn render_outbound(
    text: &str,
    buttons: &[Button],
    image_url: Option<&String>,
    state: &ExecutionState,
) -> RenderedResponse {
    RenderedResponse {
        message: OutboundMessage {
            text: template::render(text, &state.variables).into_owned(),
            buttons: render_buttons(buttons, state),
            image_url: image_url.map(|u| template::render(u, &state.variables).into_owned()),
        },
        payload: None,
    }
}

fn render_message(m: &MessageConfig, state: &ExecutionState) -> RenderedResponse {
    render_outbound(&m.text, &m.buttons, m.image_url.as_ref(), state)
}

fn render_question(q: &QuestionConfig, state: &ExecutionState) -> RenderedResponse {
    render_outbound(&q.text, &q.buttons, q.image_url.as_ref(), state)
}
