// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger classification and flow selection.

use shopchat_config::model::TriggerPrecedence;
use shopchat_core::{Channel, FlowDefinition, TriggerKind};
use tracing::warn;

/// Command when the trimmed text begins with `command_prefix`, keyword otherwise.
pub fn classify(text: &str, command_prefix: &str) -> TriggerKind {
    if text.trim_start().starts_with(command_prefix) {
        TriggerKind::Command
    } else {
        TriggerKind::Keyword
    }
}

/// Whether `flow` would fire for `text` arriving on `channel` with the given
/// classification.
pub fn is_candidate(flow: &FlowDefinition, kind: TriggerKind, channel: Channel, text: &str) -> bool {
    let trigger = flow.trigger_text.trim().to_lowercase();
    flow.is_active
        && flow.trigger_kind == kind
        && flow.channel_scope.includes(channel)
        && !trigger.is_empty()
        && text.to_lowercase().contains(&trigger)
}

/// Pick the flow that `text` starts, if any.
///
/// Every flow is tested in listing order; when more than one fires the
/// configured precedence decides and a warning names all of them.
pub fn select<'a>(
    flows: &'a [FlowDefinition],
    text: &str,
    channel: Channel,
    command_prefix: &str,
    precedence: TriggerPrecedence,
) -> Option<&'a FlowDefinition> {
    let kind = classify(text, command_prefix);
    let candidates: Vec<&FlowDefinition> = flows
        .iter()
        .filter(|f| is_candidate(f, kind, channel, text))
        .collect();

    let chosen = match precedence {
        TriggerPrecedence::ListOrder => candidates.first().copied(),
        TriggerPrecedence::LongestMatch => candidates.iter().copied().reduce(|best, f| {
            if f.trigger_text.trim().len() > best.trigger_text.trim().len() {
                f
            } else {
                best
            }
        }),
    }?;

    if candidates.len() > 1 {
        let names: Vec<String> = candidates
            .iter()
            .map(|f| format!("{} ({:?})", f.id, f.trigger_text))
            .collect();
        warn!(
            chosen = chosen.id,
            candidates = %names.join(", "),
            ?precedence,
            "ambiguous trigger: several flows match"
        );
    }
    Some(chosen)
}
