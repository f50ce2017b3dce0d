// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static checks over authored flows, reported by `shopchat flows check`.

use std::collections::{HashMap, HashSet};
use std::fmt;

use shopchat_core::{Channel, ChannelScope, FlowConnection, FlowDefinition, FlowNode, NodeKind};

use crate::template;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintIssue {
    pub severity: Severity,
    /// `None` for issues spanning several flows.
    pub flow_id: Option<i64>,
    pub message: String,
}

impl LintIssue {
    fn error(flow_id: i64, message: String) -> Self {
        Self {
            severity: Severity::Error,
            flow_id: Some(flow_id),
            message,
        }
    }

    fn warning(flow_id: i64, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            flow_id: Some(flow_id),
            message,
        }
    }
}

impl fmt::Display for LintIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.flow_id {
            Some(id) => write!(f, "{level}: flow {id}: {}", self.message),
            None => write!(f, "{level}: {}", self.message),
        }
    }
}

fn scopes_overlap(a: ChannelScope, b: ChannelScope) -> bool {
    Channel::ALL
        .iter()
        .any(|c| a.includes(*c) && b.includes(*c))
}

/// Pairs of active flows where one trigger would also fire the other.
pub fn overlapping_triggers(flows: &[FlowDefinition]) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    let active: Vec<&FlowDefinition> = flows.iter().filter(|f| f.is_active).collect();
    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            if a.trigger_kind != b.trigger_kind || !scopes_overlap(a.channel_scope, b.channel_scope)
            {
                continue;
            }
            let ta = a.trigger_text.trim().to_lowercase();
            let tb = b.trigger_text.trim().to_lowercase();
            if ta.is_empty() || tb.is_empty() {
                continue;
            }
            if ta.contains(&tb) || tb.contains(&ta) {
                issues.push(LintIssue {
                    severity: Severity::Warning,
                    flow_id: None,
                    message: format!(
                        "flows {} ({:?}) and {} ({:?}) have overlapping {} triggers; \
                         trigger_precedence decides which one starts",
                        a.id, a.trigger_text, b.id, b.trigger_text, a.trigger_kind
                    ),
                });
            }
        }
    }
    issues
}

/// Structural checks for one flow's graph.
pub fn check_flow(
    flow: &FlowDefinition,
    nodes: &[FlowNode],
    connections: &[FlowConnection],
) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    let id = flow.id;

    if flow.trigger_text.trim().is_empty() {
        issues.push(LintIssue::error(id, "trigger text is empty, the flow can never start".into()));
    }

    let by_id: HashMap<&str, &FlowNode> = nodes.iter().map(|n| (n.node_id.as_str(), n)).collect();
    let mut outgoing: HashMap<&str, Vec<&FlowConnection>> = HashMap::new();
    for c in connections {
        for end in [&c.source_node_id, &c.target_node_id] {
            if !by_id.contains_key(end.as_str()) {
                issues.push(LintIssue::error(
                    id,
                    format!(
                        "connection {} -> {} references unknown node `{end}`",
                        c.source_node_id, c.target_node_id
                    ),
                ));
            }
        }
        outgoing.entry(c.source_node_id.as_str()).or_default().push(c);
    }

    let starts: Vec<&FlowNode> = nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::Start))
        .collect();
    let start = match starts.as_slice() {
        [] => {
            issues.push(LintIssue::error(id, "no start node".into()));
            None
        }
        [one] => Some(*one),
        many => {
            issues.push(LintIssue::error(
                id,
                format!("{} start nodes, expected exactly one", many.len()),
            ));
            None
        }
    };

    if let Some(start) = start {
        let edges = outgoing.get(start.node_id.as_str()).map_or(0, Vec::len);
        if edges != 1 {
            issues.push(LintIssue::warning(
                id,
                format!("start node has {edges} outgoing connections, expected exactly one"),
            ));
        }

        let reachable = reachable_from(start.node_id.as_str(), &outgoing);
        for n in nodes {
            if !reachable.contains(n.node_id.as_str()) {
                issues.push(LintIssue::warning(
                    id,
                    format!("node `{}` is unreachable from the start node", n.node_id),
                ));
            }
        }
    }

    if let Some(node) = zero_input_cycle(nodes, &outgoing, &by_id) {
        issues.push(LintIssue::error(
            id,
            format!("node `{node}` is part of a cycle that never waits for input"),
        ));
    }

    issues.extend(unset_variables(id, nodes));
    issues
}

fn reachable_from<'a>(
    start: &'a str,
    outgoing: &HashMap<&'a str, Vec<&'a FlowConnection>>,
) -> HashSet<&'a str> {
    let mut seen = HashSet::from([start]);
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        for c in outgoing.get(node).into_iter().flatten() {
            if seen.insert(c.target_node_id.as_str()) {
                stack.push(c.target_node_id.as_str());
            }
        }
    }
    seen
}

/// A node on a cycle made only of start/condition nodes, if any.
fn zero_input_cycle<'a>(
    nodes: &'a [FlowNode],
    outgoing: &HashMap<&str, Vec<&'a FlowConnection>>,
    by_id: &HashMap<&str, &FlowNode>,
) -> Option<&'a str> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Open,
        Done,
    }

    fn visit<'a>(
        node: &'a str,
        outgoing: &HashMap<&str, Vec<&'a FlowConnection>>,
        by_id: &HashMap<&str, &FlowNode>,
        marks: &mut HashMap<&'a str, Mark>,
    ) -> bool {
        match marks.get(node) {
            Some(Mark::Open) => return true,
            Some(Mark::Done) => return false,
            None => {}
        }
        marks.insert(node, Mark::Open);
        for c in outgoing.get(node).into_iter().flatten() {
            let target = c.target_node_id.as_str();
            let zero_input = by_id.get(target).is_some_and(|n| n.kind.is_zero_input());
            if zero_input && visit(target, outgoing, by_id, marks) {
                return true;
            }
        }
        marks.insert(node, Mark::Done);
        false
    }

    let mut marks = HashMap::new();
    nodes
        .iter()
        .filter(|n| n.kind.is_zero_input())
        .map(|n| n.node_id.as_str())
        .find(|id| visit(*id, outgoing, by_id, &mut marks))
}

/// Placeholders that no question or api_call node in the flow ever sets.
fn unset_variables(flow_id: i64, nodes: &[FlowNode]) -> Vec<LintIssue> {
    let mut set: HashSet<&str> = HashSet::new();
    let mut prefixes: Vec<&str> = Vec::new();
    for n in nodes {
        match &n.kind {
            NodeKind::Question(q) => {
                set.insert(q.variable.as_str());
            }
            NodeKind::ApiCall(c) => {
                if let Some(v) = &c.response_variable {
                    set.insert(v.as_str());
                    prefixes.push(v.as_str());
                }
            }
            _ => {}
        }
    }

    let mut issues = Vec::new();
    for n in nodes {
        let templates: Vec<&str> = match &n.kind {
            NodeKind::Message(m) => vec![m.text.as_str()],
            NodeKind::Question(q) => vec![q.text.as_str()],
            NodeKind::ApiCall(c) => {
                let mut t = vec![c.url.as_str(), c.success_message.as_str()];
                t.extend(c.body.as_deref());
                t
            }
            NodeKind::Action(a) => a.header.iter().chain(&a.empty_message).map(String::as_str).collect(),
            NodeKind::Start | NodeKind::Condition => Vec::new(),
        };
        for name in templates.into_iter().flat_map(template::placeholders) {
            let from_response = prefixes
                .iter()
                .any(|p| name.strip_prefix(p).is_some_and(|rest| rest.starts_with('.')));
            if !set.contains(name) && !from_response {
                issues.push(LintIssue::warning(
                    flow_id,
                    format!(
                        "node `{}` uses {{{{{name}}}}} but no node stores it; it will render verbatim",
                        n.node_id
                    ),
                ));
            }
        }
    }
    issues
}
