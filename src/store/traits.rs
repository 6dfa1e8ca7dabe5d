//! Trait abstraction for the document store

use super::models::{ConnectionConfig, SuiteSnapshot};
use anyhow::Result;
use async_trait::async_trait;

/// Durable storage for suite snapshots and scope connections.
///
/// Snapshots are keyed by `(resource_scope, key)` and always written whole;
/// an upsert replaces any previous document with the same identity.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    // ========================================================================
    // Suite snapshots
    // ========================================================================

    /// Insert or fully replace one snapshot
    async fn upsert_snapshot(&self, snapshot: &SuiteSnapshot) -> Result<()>;

    /// Insert or fully replace a batch of snapshots
    async fn upsert_snapshots(&self, snapshots: &[SuiteSnapshot]) -> Result<()>;

    /// Get one snapshot by scope and suite key
    async fn get_snapshot(&self, resource_scope: &str, key: &str) -> Result<Option<SuiteSnapshot>>;

    /// All snapshots of a scope, ordered by key
    async fn list_snapshots(&self, resource_scope: &str) -> Result<Vec<SuiteSnapshot>>;

    /// Delete one snapshot; deleting a missing snapshot is not an error
    async fn delete_snapshot(&self, resource_scope: &str, key: &str) -> Result<()>;

    // ========================================================================
    // Connections
    // ========================================================================

    /// Insert or replace the connection of a scope
    async fn upsert_connection(&self, connection: &ConnectionConfig) -> Result<()>;

    async fn get_connection(&self, resource_scope: &str) -> Result<Option<ConnectionConfig>>;

    async fn list_connections(&self) -> Result<Vec<ConnectionConfig>>;
}
