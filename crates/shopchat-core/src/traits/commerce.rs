// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only view of the commerce subsystem used by `action` nodes.

use async_trait::async_trait;

use crate::chat::{OrderSummary, ProductSummary};
use crate::error::ShopchatError;

#[async_trait]
pub trait CommerceReader: Send + Sync {
    /// Newest products first.
    async fn recent_products(&self, limit: u32) -> Result<Vec<ProductSummary>, ShopchatError>;

    /// Case-insensitive name search.
    async fn search_products(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<ProductSummary>, ShopchatError>;

    /// The customer's newest orders first.
    async fn recent_orders(
        &self,
        customer_id: i64,
        limit: u32,
    ) -> Result<Vec<OrderSummary>, ShopchatError>;

    /// Look up one of the customer's orders by its order number.
    async fn find_order(
        &self,
        customer_id: i64,
        order_number: &str,
    ) -> Result<Option<OrderSummary>, ShopchatError>;
}
