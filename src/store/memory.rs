//! In-memory snapshot store.
//!
//! Used by tests and by `store.backend: memory` for running without a
//! Meilisearch instance. Contents are lost on restart.

use super::models::{ConnectionConfig, SuiteSnapshot};
use super::traits::SnapshotStore;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemorySnapshotStore {
    /// Keyed by (scope, suite key); the BTreeMap keeps listings ordered
    snapshots: RwLock<BTreeMap<(String, String), SuiteSnapshot>>,
    connections: RwLock<BTreeMap<String, ConnectionConfig>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored snapshots across scopes
    pub async fn snapshot_count(&self) -> usize {
        self.snapshots.read().await.len()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn upsert_snapshot(&self, snapshot: &SuiteSnapshot) -> Result<()> {
        self.snapshots.write().await.insert(
            (snapshot.resource_scope.clone(), snapshot.key.clone()),
            snapshot.clone(),
        );
        Ok(())
    }

    async fn upsert_snapshots(&self, snapshots: &[SuiteSnapshot]) -> Result<()> {
        let mut stored = self.snapshots.write().await;
        for snapshot in snapshots {
            stored.insert(
                (snapshot.resource_scope.clone(), snapshot.key.clone()),
                snapshot.clone(),
            );
        }
        Ok(())
    }

    async fn get_snapshot(&self, resource_scope: &str, key: &str) -> Result<Option<SuiteSnapshot>> {
        Ok(self
            .snapshots
            .read()
            .await
            .get(&(resource_scope.to_string(), key.to_string()))
            .cloned())
    }

    async fn list_snapshots(&self, resource_scope: &str) -> Result<Vec<SuiteSnapshot>> {
        Ok(self
            .snapshots
            .read()
            .await
            .iter()
            .filter(|((scope, _), _)| scope == resource_scope)
            .map(|(_, snapshot)| snapshot.clone())
            .collect())
    }

    async fn delete_snapshot(&self, resource_scope: &str, key: &str) -> Result<()> {
        self.snapshots
            .write()
            .await
            .remove(&(resource_scope.to_string(), key.to_string()));
        Ok(())
    }

    async fn upsert_connection(&self, connection: &ConnectionConfig) -> Result<()> {
        self.connections
            .write()
            .await
            .insert(connection.resource_scope.clone(), connection.clone());
        Ok(())
    }

    async fn get_connection(&self, resource_scope: &str) -> Result<Option<ConnectionConfig>> {
        Ok(self.connections.read().await.get(resource_scope).cloned())
    }

    async fn list_connections(&self) -> Result<Vec<ConnectionConfig>> {
        Ok(self.connections.read().await.values().cloned().collect())
    }
}
