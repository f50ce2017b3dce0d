// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flow, node and connection queries, plus bundle import.

use std::collections::HashSet;

use rusqlite::{OptionalExtension, params};
use shopchat_core::{
    FlowBundle, FlowConnection, FlowDefinition, FlowNode, NodeKind, Predicate, ShopchatError,
};

use crate::database::Database;
use crate::queries::parse_column;

const FLOW_COLUMNS: &str = "id, name, channel_scope, trigger_kind, trigger_text, is_active";

fn flow_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FlowDefinition> {
    Ok(FlowDefinition {
        id: row.get(0)?,
        name: row.get(1)?,
        channel_scope: parse_column(row, 2)?,
        trigger_kind: parse_column(row, 3)?,
        trigger_text: row.get(4)?,
        is_active: row.get(5)?,
    })
}

/// Raw node row; config is decoded outside the writer thread so a bad config
/// surfaces as a configuration error rather than a storage error.
type NodeRow = (i64, String, String, String);

fn node_from_raw((flow_id, node_id, node_type, config): NodeRow) -> Result<FlowNode, ShopchatError> {
    let kind = NodeKind::from_parts(&node_type, &config).map_err(|e| {
        ShopchatError::Configuration(format!("flow {flow_id} node `{node_id}`: {e}"))
    })?;
    Ok(FlowNode {
        flow_id,
        node_id,
        kind,
    })
}

type ConnectionRow = (i64, String, String, String, Option<String>);

fn connection_from_raw(
    (flow_id, source, target, kind, value): ConnectionRow,
) -> Result<FlowConnection, ShopchatError> {
    Ok(FlowConnection {
        flow_id,
        source_node_id: source,
        target_node_id: target,
        predicate: Predicate::from_parts(&kind, value)?,
    })
}

/// Active flows in listing order.
pub async fn list_active_flows(db: &Database) -> Result<Vec<FlowDefinition>, ShopchatError> {
    db.call("list_active_flows", |conn| -> Result<_, rusqlite::Error> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {FLOW_COLUMNS} FROM flows WHERE is_active = 1 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([], flow_from_row)?;
        rows.collect()
    })
    .await
}

/// Every flow, active or not, in listing order.
pub async fn list_flows(db: &Database) -> Result<Vec<FlowDefinition>, ShopchatError> {
    db.call("list_flows", |conn| -> Result<_, rusqlite::Error> {
        let mut stmt = conn.prepare(&format!("SELECT {FLOW_COLUMNS} FROM flows ORDER BY id ASC"))?;
        let rows = stmt.query_map([], flow_from_row)?;
        rows.collect()
    })
    .await
}

pub async fn get_flow(db: &Database, id: i64) -> Result<Option<FlowDefinition>, ShopchatError> {
    db.call("get_flow", move |conn| -> Result<_, rusqlite::Error> {
        conn.query_row(
            &format!("SELECT {FLOW_COLUMNS} FROM flows WHERE id = ?1"),
            params![id],
            flow_from_row,
        )
        .optional()
    })
    .await
}

pub async fn set_flow_active(db: &Database, id: i64, active: bool) -> Result<(), ShopchatError> {
    let changed = db
        .call("set_flow_active", move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE flows SET is_active = ?2 WHERE id = ?1",
                params![id, active],
            )
        })
        .await?;
    if changed == 0 {
        return Err(ShopchatError::not_found("flow", id));
    }
    Ok(())
}

/// The flow's first `start` node.
pub async fn find_start_node(
    db: &Database,
    flow_id: i64,
) -> Result<Option<FlowNode>, ShopchatError> {
    let raw = db
        .call("find_start_node", move |conn| -> Result<_, rusqlite::Error> {
            conn.query_row(
                "SELECT flow_id, node_id, node_type, config FROM flow_nodes \
                 WHERE flow_id = ?1 AND node_type = 'start' ORDER BY rowid LIMIT 1",
                params![flow_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
        })
        .await?;
    raw.map(node_from_raw).transpose()
}

pub async fn get_node(
    db: &Database,
    flow_id: i64,
    node_id: &str,
) -> Result<Option<FlowNode>, ShopchatError> {
    let node_id = node_id.to_string();
    let raw = db
        .call("get_node", move |conn| -> Result<_, rusqlite::Error> {
            conn.query_row(
                "SELECT flow_id, node_id, node_type, config FROM flow_nodes \
                 WHERE flow_id = ?1 AND node_id = ?2",
                params![flow_id, node_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()
        })
        .await?;
    raw.map(node_from_raw).transpose()
}

/// All nodes of a flow in insertion order.
pub async fn list_nodes(db: &Database, flow_id: i64) -> Result<Vec<FlowNode>, ShopchatError> {
    let raw: Vec<NodeRow> = db
        .call("list_nodes", move |conn| -> Result<_, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT flow_id, node_id, node_type, config FROM flow_nodes \
                 WHERE flow_id = ?1 ORDER BY rowid",
            )?;
            let rows = stmt.query_map(params![flow_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?;
            rows.collect()
        })
        .await?;
    raw.into_iter().map(node_from_raw).collect()
}

/// Outgoing edges of one node in evaluation order.
pub async fn outgoing_connections(
    db: &Database,
    flow_id: i64,
    node_id: &str,
) -> Result<Vec<FlowConnection>, ShopchatError> {
    let node_id = node_id.to_string();
    let raw: Vec<ConnectionRow> = db
        .call("outgoing_connections", move |conn| -> Result<_, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT flow_id, source_node_id, target_node_id, condition_kind, condition_value \
                 FROM flow_connections WHERE flow_id = ?1 AND source_node_id = ?2 \
                 ORDER BY position ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![flow_id, node_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?;
            rows.collect()
        })
        .await?;
    raw.into_iter().map(connection_from_raw).collect()
}

/// Every edge of a flow, grouped by source in evaluation order.
pub async fn list_connections(
    db: &Database,
    flow_id: i64,
) -> Result<Vec<FlowConnection>, ShopchatError> {
    let raw: Vec<ConnectionRow> = db
        .call("list_connections", move |conn| -> Result<_, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT flow_id, source_node_id, target_node_id, condition_kind, condition_value \
                 FROM flow_connections WHERE flow_id = ?1 \
                 ORDER BY source_node_id, position ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![flow_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?;
            rows.collect()
        })
        .await?;
    raw.into_iter().map(connection_from_raw).collect()
}

/// Structural checks a bundle must pass before it is written.
pub fn validate_bundle(bundle: &FlowBundle) -> Result<(), ShopchatError> {
    let fail = |msg: String| Err(ShopchatError::Configuration(format!("{}: {msg}", bundle.name)));

    if bundle.trigger_text.trim().is_empty() {
        return fail("trigger_text must not be empty".into());
    }
    let mut ids = HashSet::new();
    for node in &bundle.nodes {
        if node.id.trim().is_empty() {
            return fail("node id must not be empty".into());
        }
        if !ids.insert(node.id.as_str()) {
            return fail(format!("duplicate node id `{}`", node.id));
        }
    }
    if !bundle.nodes.iter().any(|n| n.kind == NodeKind::Start) {
        return fail("flow has no start node".into());
    }
    for edge in &bundle.connections {
        for end in [&edge.from, &edge.to] {
            if !ids.contains(end.as_str()) {
                return fail(format!("connection references unknown node `{end}`"));
            }
        }
    }
    Ok(())
}

/// Write a complete flow in one transaction and return its id.
pub async fn import_bundle(db: &Database, bundle: &FlowBundle) -> Result<i64, ShopchatError> {
    validate_bundle(bundle)?;

    let nodes = bundle
        .nodes
        .iter()
        .map(|n| Ok((n.id.clone(), n.kind.type_name(), n.kind.config_json()?)))
        .collect::<Result<Vec<_>, ShopchatError>>()?;
    let edges: Vec<(String, String, &'static str, Option<String>)> = bundle
        .connections
        .iter()
        .map(|c| {
            (
                c.from.clone(),
                c.to.clone(),
                c.when.kind_name(),
                c.when.value().map(str::to_string),
            )
        })
        .collect();
    let header = (
        bundle.name.clone(),
        bundle.channel_scope.to_string(),
        bundle.trigger_kind.to_string(),
        bundle.trigger_text.clone(),
        bundle.is_active,
    );

    db.call("import_bundle", move |conn| -> Result<i64, rusqlite::Error> {
        let tx = conn.transaction()?;
        let (name, scope, kind, text, active) = header;
        tx.execute(
            "INSERT INTO flows (name, channel_scope, trigger_kind, trigger_text, is_active) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, scope, kind, text, active],
        )?;
        let flow_id = tx.last_insert_rowid();
        {
            let mut insert_node = tx.prepare(
                "INSERT INTO flow_nodes (flow_id, node_id, node_type, config) \
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (node_id, node_type, config) in &nodes {
                insert_node.execute(params![flow_id, node_id, node_type, config])?;
            }
            let mut insert_edge = tx.prepare(
                "INSERT INTO flow_connections \
                 (flow_id, source_node_id, target_node_id, condition_kind, condition_value, position) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for (position, (from, to, kind, value)) in edges.iter().enumerate() {
                insert_edge.execute(params![flow_id, from, to, kind, value, position as i64])?;
            }
        }
        tx.commit()?;
        Ok(flow_id)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_temp, sample_bundle};
    use shopchat_core::{Channel, ChannelScope, TriggerKind};

    #[tokio::test]
    async fn import_and_read_back() {
        let (db, _dir) = open_temp().await;
        let flow_id = import_bundle(&db, &sample_bundle()).await.unwrap();

        let flow = get_flow(&db, flow_id).await.unwrap().unwrap();
        assert_eq!(flow.name, "Main menu");
        assert_eq!(flow.trigger_kind, TriggerKind::Command);
        assert_eq!(flow.channel_scope, ChannelScope::All);
        assert!(flow.is_active);

        let start = find_start_node(&db, flow_id).await.unwrap().unwrap();
        assert_eq!(start.node_id, "start");
        assert_eq!(start.kind, NodeKind::Start);

        let menu = get_node(&db, flow_id, "menu").await.unwrap().unwrap();
        assert!(matches!(menu.kind, NodeKind::Message(_)));
        assert_eq!(list_nodes(&db, flow_id).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn outgoing_connections_keep_authoring_order() {
        let (db, _dir) = open_temp().await;
        let flow_id = import_bundle(&db, &sample_bundle()).await.unwrap();

        let edges = outgoing_connections(&db, flow_id, "menu").await.unwrap();
        let targets: Vec<_> = edges.iter().map(|e| e.target_node_id.as_str()).collect();
        assert_eq!(targets, ["products", "orders"]);
        assert_eq!(edges[0].predicate, Predicate::Equals("1".into()));

        assert!(outgoing_connections(&db, flow_id, "products").await.unwrap().is_empty());
        assert_eq!(list_connections(&db, flow_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn inactive_flows_are_not_listed_as_active() {
        let (db, _dir) = open_temp().await;
        let first = import_bundle(&db, &sample_bundle()).await.unwrap();
        let mut second = sample_bundle();
        second.name = "WhatsApp only".into();
        second.channel_scope = ChannelScope::Only(Channel::Whatsapp);
        let second = import_bundle(&db, &second).await.unwrap();

        set_flow_active(&db, first, false).await.unwrap();
        let active = list_active_flows(&db).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second);
        assert_eq!(active[0].channel_scope, ChannelScope::Only(Channel::Whatsapp));
        assert_eq!(list_flows(&db).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn set_active_on_missing_flow_is_not_found() {
        let (db, _dir) = open_temp().await;
        let err = set_flow_active(&db, 42, true).await.unwrap_err();
        assert!(matches!(err, ShopchatError::NotFound { entity: "flow", .. }));
    }

    #[tokio::test]
    async fn bundle_with_dangling_edge_is_rejected() {
        let (db, _dir) = open_temp().await;
        let mut bundle = sample_bundle();
        bundle.connections[0].to = "nowhere".into();
        let err = import_bundle(&db, &bundle).await.unwrap_err();
        assert!(matches!(err, ShopchatError::Configuration(_)));
        assert!(list_flows(&db).await.unwrap().is_empty());
    }

    #[test]
    fn bundle_without_start_is_rejected() {
        let mut bundle = sample_bundle();
        bundle.nodes.retain(|n| n.kind != NodeKind::Start);
        bundle.connections.clear();
        let err = validate_bundle(&bundle).unwrap_err();
        assert!(err.to_string().contains("no start node"));
    }

    #[tokio::test]
    async fn corrupt_node_config_is_a_configuration_error() {
        let (db, _dir) = open_temp().await;
        let flow_id = import_bundle(&db, &sample_bundle()).await.unwrap();
        db.call("corrupt", move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE flow_nodes SET config = '{\"action\": 7}' \
                 WHERE flow_id = ?1 AND node_id = 'products'",
                params![flow_id],
            )
        })
        .await
        .unwrap();

        let err = get_node(&db, flow_id, "products").await.unwrap_err();
        assert!(matches!(err, ShopchatError::Configuration(_)));
    }
}
