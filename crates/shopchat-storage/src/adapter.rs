// SPDX-FileCopyrightText: 2026 Shopchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage adapter and every repository trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use shopchat_config::model::StorageConfig;
use shopchat_core::{
    AdapterType, Channel, ChatMessage, ChatSession, ChatStore, CommerceReader, Customer,
    CustomerRepository, ExecutionState, ExecutionStateRepository, FlowBundle, FlowConnection,
    FlowDefinition, FlowNode, FlowRepository, HealthStatus, NewMessage, OrderSummary,
    PluginAdapter, ProductSummary, ReadReceipt, ShopchatError, StorageAdapter, StoredMessage,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage.
///
/// The database is opened by [`StorageAdapter::initialize`]; every other
/// call fails with a storage error until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Construct and initialize in one step.
    pub async fn open(config: StorageConfig) -> Result<Self, ShopchatError> {
        let storage = Self::new(config);
        storage.initialize().await?;
        Ok(storage)
    }

    /// The underlying database handle.
    pub fn database(&self) -> Result<&Database, ShopchatError> {
        self.db.get().ok_or_else(|| ShopchatError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Write a complete flow and return its id.
    pub async fn import_bundle(&self, bundle: &FlowBundle) -> Result<i64, ShopchatError> {
        queries::flows::import_bundle(self.database()?, bundle).await
    }

    pub async fn list_flows(&self) -> Result<Vec<FlowDefinition>, ShopchatError> {
        queries::flows::list_flows(self.database()?).await
    }

    pub async fn list_nodes(&self, flow_id: i64) -> Result<Vec<FlowNode>, ShopchatError> {
        queries::flows::list_nodes(self.database()?, flow_id).await
    }

    pub async fn list_connections(
        &self,
        flow_id: i64,
    ) -> Result<Vec<FlowConnection>, ShopchatError> {
        queries::flows::list_connections(self.database()?, flow_id).await
    }

    pub async fn set_flow_active(&self, flow_id: i64, active: bool) -> Result<(), ShopchatError> {
        queries::flows::set_flow_active(self.database()?, flow_id, active).await
    }

    pub async fn get_state(&self, id: i64) -> Result<Option<ExecutionState>, ShopchatError> {
        queries::executions::get_state(self.database()?, id).await
    }

    pub async fn get_session(
        &self,
        customer_id: i64,
    ) -> Result<Option<ChatSession>, ShopchatError> {
        queries::sessions::get_session(self.database()?, customer_id).await
    }

    pub async fn insert_product(
        &self,
        name: &str,
        price: f64,
        stock: i64,
    ) -> Result<i64, ShopchatError> {
        queries::commerce::insert_product(self.database()?, name, price, stock).await
    }

    pub async fn insert_order(
        &self,
        customer_id: i64,
        order_number: &str,
        status: &str,
        total: f64,
    ) -> Result<i64, ShopchatError> {
        queries::commerce::insert_order(self.database()?, customer_id, order_number, status, total)
            .await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ShopchatError> {
        let Ok(db) = self.database() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        match db
            .call("health_check", |conn| -> Result<(), rusqlite::Error> {
                conn.query_row("SELECT 1", [], |_| Ok(()))
            })
            .await
        {
            Ok(()) => Ok(HealthStatus::Healthy),
            Err(ShopchatError::Timeout { duration }) => Ok(HealthStatus::Degraded(format!(
                "query exceeded {}ms",
                duration.as_millis()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), ShopchatError> {
        if self.db.initialized() {
            self.close().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), ShopchatError> {
        let db = Database::open_with(&self.config).await?;
        self.db.set(db).map_err(|_| ShopchatError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ShopchatError> {
        self.database()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl FlowRepository for SqliteStorage {
    async fn list_active_flows(&self) -> Result<Vec<FlowDefinition>, ShopchatError> {
        queries::flows::list_active_flows(self.database()?).await
    }

    async fn find_start_node(&self, flow_id: i64) -> Result<Option<FlowNode>, ShopchatError> {
        queries::flows::find_start_node(self.database()?, flow_id).await
    }

    async fn get_node(
        &self,
        flow_id: i64,
        node_id: &str,
    ) -> Result<Option<FlowNode>, ShopchatError> {
        queries::flows::get_node(self.database()?, flow_id, node_id).await
    }

    async fn outgoing_connections(
        &self,
        flow_id: i64,
        node_id: &str,
    ) -> Result<Vec<FlowConnection>, ShopchatError> {
        queries::flows::outgoing_connections(self.database()?, flow_id, node_id).await
    }
}

#[async_trait]
impl CustomerRepository for SqliteStorage {
    async fn get_or_create_customer(
        &self,
        channel: Channel,
        external_id: &str,
        display_name: &str,
    ) -> Result<Customer, ShopchatError> {
        queries::customers::get_or_create_customer(
            self.database()?,
            channel,
            external_id,
            display_name,
        )
        .await
    }

    async fn get_customer(&self, id: i64) -> Result<Option<Customer>, ShopchatError> {
        queries::customers::get_customer(self.database()?, id).await
    }
}

#[async_trait]
impl ExecutionStateRepository for SqliteStorage {
    async fn active_state(
        &self,
        customer_id: i64,
    ) -> Result<Option<ExecutionState>, ShopchatError> {
        queries::executions::active_state(self.database()?, customer_id).await
    }

    async fn create_state(
        &self,
        customer_id: i64,
        flow_id: i64,
        node_id: &str,
        channel: Channel,
    ) -> Result<ExecutionState, ShopchatError> {
        queries::executions::create_state(self.database()?, customer_id, flow_id, node_id, channel)
            .await
    }

    async fn save_state(&self, state: &ExecutionState) -> Result<ExecutionState, ShopchatError> {
        queries::executions::save_state(self.database()?, state).await
    }
}

#[async_trait]
impl ChatStore for SqliteStorage {
    async fn save_incoming(&self, message: NewMessage) -> Result<StoredMessage, ShopchatError> {
        queries::messages::save_incoming(self.database()?, message).await
    }

    async fn save_outgoing(&self, message: NewMessage) -> Result<StoredMessage, ShopchatError> {
        queries::messages::save_outgoing(self.database()?, message).await
    }

    async fn mark_read(&self, customer_id: i64) -> Result<ReadReceipt, ShopchatError> {
        queries::messages::mark_read(self.database()?, customer_id).await
    }

    async fn list_sessions(&self) -> Result<Vec<ChatSession>, ShopchatError> {
        queries::sessions::list_sessions(self.database()?).await
    }

    async fn list_messages(
        &self,
        customer_id: i64,
        limit: u32,
        before_id: Option<i64>,
    ) -> Result<Vec<ChatMessage>, ShopchatError> {
        queries::messages::list_messages(self.database()?, customer_id, limit, before_id).await
    }

    async fn unread_total(&self) -> Result<i64, ShopchatError> {
        queries::sessions::unread_total(self.database()?).await
    }
}

#[async_trait]
impl CommerceReader for SqliteStorage {
    async fn recent_products(&self, limit: u32) -> Result<Vec<ProductSummary>, ShopchatError> {
        queries::commerce::recent_products(self.database()?, limit).await
    }

    async fn search_products(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<ProductSummary>, ShopchatError> {
        queries::commerce::search_products(self.database()?, query, limit).await
    }

    async fn recent_orders(
        &self,
        customer_id: i64,
        limit: u32,
    ) -> Result<Vec<OrderSummary>, ShopchatError> {
        queries::commerce::recent_orders(self.database()?, customer_id, limit).await
    }

    async fn find_order(
        &self,
        customer_id: i64,
        order_number: &str,
    ) -> Result<Option<OrderSummary>, ShopchatError> {
        queries::commerce::find_order(self.database()?, customer_id, order_number).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_bundle;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
            query_timeout_ms: 5_000,
        }
    }

    #[tokio::test]
    async fn identity_and_type() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(
            dir.path().join("t.db").to_str().unwrap(),
        ));
        assert_eq!(storage.name(), "sqlite");
        assert_eq!(storage.adapter_type(), AdapterType::Storage);
        assert_eq!(
            storage.health_check().await.unwrap(),
            HealthStatus::Unhealthy("not initialized".into())
        );
    }

    #[tokio::test]
    async fn calls_before_initialize_fail() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::new(make_config(
            dir.path().join("t.db").to_str().unwrap(),
        ));
        assert!(storage.list_active_flows().await.is_err());
    }

    #[tokio::test]
    async fn double_initialize_fails() {
        let dir = tempdir().unwrap();
        let storage = SqliteStorage::open(make_config(
            dir.path().join("t.db").to_str().unwrap(),
        ))
        .await
        .unwrap();
        assert!(storage.initialize().await.is_err());
        assert_eq!(storage.health_check().await.unwrap(), HealthStatus::Healthy);
        storage.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn repository_traits_work_through_dyn() {
        let dir = tempdir().unwrap();
        let storage = std::sync::Arc::new(
            SqliteStorage::open(make_config(dir.path().join("t.db").to_str().unwrap()))
                .await
                .unwrap(),
        );
        let flow_id = storage.import_bundle(&sample_bundle()).await.unwrap();

        let flows: std::sync::Arc<dyn FlowRepository> = storage.clone();
        let active = flows.list_active_flows().await.unwrap();
        assert_eq!(active[0].id, flow_id);

        let customers: std::sync::Arc<dyn CustomerRepository> = storage.clone();
        let c = customers
            .get_or_create_customer(Channel::Whatsapp, "1555", "")
            .await
            .unwrap();
        assert_eq!(c.name, "WhatsApp User 1555");

        let chat: std::sync::Arc<dyn ChatStore> = storage;
        assert_eq!(chat.unread_total().await.unwrap(), 0);
    }
}
