// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-customer serialization of flow advances.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per customer, created on demand and dropped once nobody
/// holds or waits on it.
#[derive(Debug, Default)]
pub struct CustomerLocks {
    slots: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl CustomerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `customer_id`.
    pub async fn acquire(&self, customer_id: i64) -> CustomerGuard {
        let slot = self
            .slots
            .entry(customer_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = slot.lock_owned().await;
        CustomerGuard {
            customer_id,
            slots: Arc::clone(&self.slots),
            guard: Some(guard),
        }
    }

    /// Customers with a live lock entry.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Held for the duration of one customer's message handling.
pub struct CustomerGuard {
    customer_id: i64,
    slots: Arc<DashMap<i64, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for CustomerGuard {
    fn drop(&mut self) {
        // Release first so the count below only sees the map's reference and
        // any waiters' clones.
        self.guard.take();
        self.slots
            .remove_if(&self.customer_id, |_, slot| Arc::strong_count(slot) == 1);
    }
}
