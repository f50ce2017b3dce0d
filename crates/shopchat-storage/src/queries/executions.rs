// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution-state queries.
//!
//! Creation relies on the partial unique index over non-completed states;
//! advances are conditional on the row's `version`.

use std::collections::BTreeMap;

use rusqlite::types::Type;
use rusqlite::{OptionalExtension, params};
use shopchat_core::{Channel, ExecutionState, ShopchatError};

use crate::database::{Database, is_constraint_violation};
use crate::queries::parse_column;

const STATE_COLUMNS: &str = "id, customer_id, flow_id, current_node_id, variables, channel, \
                             completed, version, created_at, updated_at";

fn state_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExecutionState> {
    let raw_vars: String = row.get(4)?;
    let variables: BTreeMap<String, String> = serde_json::from_str(&raw_vars)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    Ok(ExecutionState {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        flow_id: row.get(2)?,
        current_node_id: row.get(3)?,
        variables,
        channel: parse_column(row, 5)?,
        completed: row.get(6)?,
        version: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// The customer's non-completed state, if any.
pub async fn active_state(
    db: &Database,
    customer_id: i64,
) -> Result<Option<ExecutionState>, ShopchatError> {
    db.call("active_state", move |conn| -> Result<_, rusqlite::Error> {
        conn.query_row(
            &format!(
                "SELECT {STATE_COLUMNS} FROM execution_states \
                 WHERE customer_id = ?1 AND completed = 0"
            ),
            params![customer_id],
            state_from_row,
        )
        .optional()
    })
    .await
}

pub async fn get_state(db: &Database, id: i64) -> Result<Option<ExecutionState>, ShopchatError> {
    db.call("get_state", move |conn| -> Result<_, rusqlite::Error> {
        conn.query_row(
            &format!("SELECT {STATE_COLUMNS} FROM execution_states WHERE id = ?1"),
            params![id],
            state_from_row,
        )
        .optional()
    })
    .await
}

/// Insert a fresh active state at `node_id`.
///
/// Returns [`ShopchatError::Conflict`] when the customer already has an
/// active state.
pub async fn create_state(
    db: &Database,
    customer_id: i64,
    flow_id: i64,
    node_id: &str,
    channel: Channel,
) -> Result<ExecutionState, ShopchatError> {
    let node_id = node_id.to_string();
    let channel_name = channel.to_string();
    let created = db
        .call("create_state", move |conn| -> Result<_, rusqlite::Error> {
            let inserted = conn.query_row(
                &format!(
                    "INSERT INTO execution_states (customer_id, flow_id, current_node_id, channel) \
                     VALUES (?1, ?2, ?3, ?4) RETURNING {STATE_COLUMNS}"
                ),
                params![customer_id, flow_id, node_id, channel_name],
                state_from_row,
            );
            match inserted {
                Ok(state) => Ok(Some(state)),
                Err(e) if is_constraint_violation(&e) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await?;
    created.ok_or_else(|| {
        ShopchatError::Conflict(format!("customer {customer_id} already has an active flow"))
    })
}

/// Persist the cursor, variables and completion flag of `state`.
///
/// The write only lands when the stored version still equals
/// `state.version`; otherwise a concurrent advance won and
/// [`ShopchatError::Conflict`] is returned.
pub async fn save_state(
    db: &Database,
    state: &ExecutionState,
) -> Result<ExecutionState, ShopchatError> {
    let id = state.id;
    let version = state.version;
    let node_id = state.current_node_id.clone();
    let completed = state.completed;
    let variables = serde_json::to_string(&state.variables)?;

    let saved = db
        .call("save_state", move |conn| -> Result<_, rusqlite::Error> {
            conn.query_row(
                &format!(
                    "UPDATE execution_states SET current_node_id = ?3, variables = ?4, \
                     completed = ?5, version = version + 1, \
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now') \
                     WHERE id = ?1 AND version = ?2 RETURNING {STATE_COLUMNS}"
                ),
                params![id, version, node_id, variables, completed],
                state_from_row,
            )
            .optional()
        })
        .await?;
    saved.ok_or_else(|| {
        ShopchatError::Conflict(format!(
            "execution state {id} changed since version {version}"
        ))
    })
}
