// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in commerce reads behind `action` nodes.

use std::collections::BTreeMap;
use std::fmt::Write;

use shopchat_core::flow::{ActionConfig, ActionKind};
use shopchat_core::{CommerceReader, OrderSummary, ProductSummary, ShopchatError};

use crate::template;

/// Run the action and format its result for the customer.
pub async fn run(
    commerce: &dyn CommerceReader,
    config: &ActionConfig,
    customer_id: i64,
    variables: &BTreeMap<String, String>,
    default_limit: u32,
) -> Result<String, ShopchatError> {
    let limit = config.limit.unwrap_or(default_limit).max(1);
    let query = variables
        .get(&config.query_variable)
        .map(|q| q.trim())
        .filter(|q| !q.is_empty());

    let (header, lines, empty) = match config.action {
        ActionKind::ListProducts => {
            let products = commerce.recent_products(limit).await?;
            (
                "Here are our latest products:".to_string(),
                products.iter().map(product_line).collect::<Vec<_>>(),
                "We have no products to show right now.",
            )
        }
        ActionKind::SearchProducts => {
            let Some(query) = query else {
                return Ok(empty_text(config, variables, "Please tell us what you are looking for."));
            };
            let products = commerce.search_products(query, limit).await?;
            (
                format!("Products matching \"{query}\":"),
                products.iter().map(product_line).collect(),
                "No products matched your search.",
            )
        }
        ActionKind::RecentOrders => {
            let orders = commerce.recent_orders(customer_id, limit).await?;
            (
                "Your recent orders:".to_string(),
                orders.iter().map(order_line).collect(),
                "You have no orders yet.",
            )
        }
        ActionKind::OrderStatus => {
            let Some(number) = query else {
                return Ok(empty_text(config, variables, "Please send your order number."));
            };
            let order = commerce.find_order(customer_id, number).await?;
            (
                format!("Order {number}:"),
                order.iter().map(order_line).collect(),
                "We could not find that order.",
            )
        }
    };

    if lines.is_empty() {
        return Ok(empty_text(config, variables, empty));
    }

    let mut out = match &config.header {
        Some(h) => template::render(h, variables).into_owned(),
        None => header,
    };
    for line in lines {
        let _ = write!(out, "\n{line}");
    }
    Ok(out)
}

fn empty_text(config: &ActionConfig, variables: &BTreeMap<String, String>, fallback: &str) -> String {
    match &config.empty_message {
        Some(t) => template::render(t, variables).into_owned(),
        None => fallback.to_string(),
    }
}

fn product_line(p: &ProductSummary) -> String {
    if p.stock > 0 {
        format!("- {} ({:.2}), {} in stock", p.name, p.price, p.stock)
    } else {
        format!("- {} ({:.2}), out of stock", p.name, p.price)
    }
}

fn order_line(o: &OrderSummary) -> String {
    let date = o.created_at.get(..10).unwrap_or(&o.created_at);
    format!("- {} [{}] total {:.2}, placed {}", o.order_number, o.status, o.total, date)
}
