// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversational flow engine for shopchat.
//!
//! Matches inbound text against flow triggers, advances per-customer
//! execution states through operator-authored graphs, and renders the
//! response of the node it stops at. Message, question, action, condition
//! and api_call nodes are supported.

pub mod actions;
pub mod api_call;
pub mod engine;
pub mod lint;
pub mod locks;
pub mod predicate;
pub mod template;
pub mod trigger;

pub use engine::FlowEngine;
pub use lint::{LintIssue, Severity};
