// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time fan-out of inbox events to dashboard subscribers.
//!
//! One admin group sees everything; each customer has a private group that
//! only carries events about that customer's conversation.

pub mod bus;
pub mod events;

pub use bus::{Audience, EventBus, Subscription};
pub use events::{Envelope, InboxEvent};
