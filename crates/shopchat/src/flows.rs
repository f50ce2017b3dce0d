// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `shopchat flows` subcommands: import bundles and lint stored flows.

use std::path::Path;

use shopchat_core::{FlowBundle, ShopchatError};
use shopchat_flow::lint::{check_flow, overlapping_triggers};
use shopchat_flow::{LintIssue, Severity};
use shopchat_storage::SqliteStorage;
use tracing::info;

/// Reads a bundle file holding either one flow object or an array of them.
pub fn read_bundles(path: &Path) -> Result<Vec<FlowBundle>, ShopchatError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ShopchatError::Config(format!("cannot read flow file {}: {e}", path.display()))
    })?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let bundles = if value.is_array() {
        serde_json::from_value(value)?
    } else {
        vec![serde_json::from_value(value)?]
    };
    Ok(bundles)
}

/// Imports every bundle in `path`, returning the new flow ids.
pub async fn import(storage: &SqliteStorage, path: &Path) -> Result<Vec<i64>, ShopchatError> {
    let bundles = read_bundles(path)?;
    let mut ids = Vec::with_capacity(bundles.len());
    for bundle in &bundles {
        let id = storage.import_bundle(bundle).await?;
        info!(id, name = %bundle.name, "flow imported");
        ids.push(id);
    }
    Ok(ids)
}

/// Lints every stored flow plus trigger overlaps across active flows.
///
/// Errors sort before warnings.
pub async fn check(storage: &SqliteStorage) -> Result<Vec<LintIssue>, ShopchatError> {
    let flows = storage.list_flows().await?;
    let mut issues = overlapping_triggers(&flows);
    for flow in &flows {
        let nodes = storage.list_nodes(flow.id).await?;
        let connections = storage.list_connections(flow.id).await?;
        issues.extend(check_flow(flow, &nodes, &connections));
    }
    issues.sort_by(|a, b| b.severity.cmp(&a.severity));
    Ok(issues)
}

/// Prints lint results; returns `true` when none of them is an error.
pub fn report(issues: &[LintIssue]) -> bool {
    if issues.is_empty() {
        println!("all flows look fine");
        return true;
    }
    for issue in issues {
        let level = match issue.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match issue.flow_id {
            Some(id) => println!("{level}: flow {id}: {}", issue.message),
            None => println!("{level}: {}", issue.message),
        }
    }
    !issues.iter().any(|i| i.severity == Severity::Error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopchat_config::model::StorageConfig;
    use std::io::Write;

    async fn storage(dir: &tempfile::TempDir) -> SqliteStorage {
        SqliteStorage::open(StorageConfig {
            database_path: dir.path().join("flows.db").to_string_lossy().to_string(),
            ..StorageConfig::default()
        })
        .await
        .unwrap()
    }

    fn keyword_flow(name: &str, trigger: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "trigger_kind": "keyword",
            "trigger_text": trigger,
            "nodes": [
                {"id": "start", "type": "start"},
                {"id": "m", "type": "message", "text": "hi"}
            ],
            "connections": [{"from": "start", "to": "m"}]
        })
    }

    fn write_json(dir: &tempfile::TempDir, value: &serde_json::Value) -> std::path::PathBuf {
        let path = dir.path().join("bundle.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(value.to_string().as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_single_object_and_array() {
        let dir = tempfile::tempdir().unwrap();
        let single = write_json(&dir, &keyword_flow("One", "hi"));
        assert_eq!(read_bundles(&single).unwrap().len(), 1);

        let many = write_json(
            &dir,
            &serde_json::json!([keyword_flow("A", "hi"), keyword_flow("B", "price")]),
        );
        let bundles = read_bundles(&many).unwrap();
        assert_eq!(bundles[1].name, "B");
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = read_bundles(Path::new("/nonexistent/flows.json")).unwrap_err();
        assert!(matches!(err, ShopchatError::Config(_)), "{err:?}");
    }

    #[tokio::test]
    async fn import_then_check_reports_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir).await;
        let path = write_json(
            &dir,
            &serde_json::json!([keyword_flow("Hi", "hi"), keyword_flow("Hi there", "hi there")]),
        );

        let ids = import(&storage, &path).await.unwrap();
        assert_eq!(ids.len(), 2);

        let issues = check(&storage).await.unwrap();
        assert!(
            issues
                .iter()
                .any(|i| i.severity == Severity::Warning && i.message.contains("overlapping")),
            "{issues:?}"
        );
        assert!(report(&issues));
    }

    #[tokio::test]
    async fn clean_flows_pass() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir).await;
        let path = write_json(&dir, &keyword_flow("Price", "price"));
        import(&storage, &path).await.unwrap();
        let issues = check(&storage).await.unwrap();
        assert!(issues.is_empty(), "{issues:?}");
        assert!(report(&issues));
    }
}
